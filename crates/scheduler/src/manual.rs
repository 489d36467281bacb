//! 수동 실행 경로 -- 운영자가 CLI로 직접 호출하는 진입점
//!
//! 스케줄러 큐를 거치지 않고 현재 태스크에서 순차적으로 실행합니다.
//! 일시적 스토리지 장애는 세션을 폐기하고 `"scheduler-run-change-reporter"`로
//! 기록한 뒤 호출자에게 그대로 전파합니다.

use std::time::Instant;

use tracing::{error, info};

use vigil_core::error::VigilError;

use crate::engine::Engine;
use crate::exceptions::SOURCE_RUN_CHANGE_REPORTER;

/// 수동 실행 결과 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualRunSummary {
    /// 처리한 계정 수
    pub accounts: usize,
    /// 처리한 `account/technology` 목록 (실행 순서)
    pub processed: Vec<String>,
}

impl Engine {
    /// 계정마다 watcher가 있는 모든 기술에 대해 watch + 감사 + 알림을 실행합니다.
    pub async fn run_change_reporter(
        &self,
        accounts: &[String],
    ) -> Result<ManualRunSummary, VigilError> {
        info!("executing manual change reporter task");
        let result = self.change_reporter(accounts).await;
        self.fail_manual_run(result).await
    }

    /// 계정 × 기술마다 watch + 감사를 실행합니다 (알림 없음).
    pub async fn run_change_finder(
        &self,
        accounts: &[String],
        technologies: &[String],
    ) -> Result<ManualRunSummary, VigilError> {
        info!("executing manual find changes task");
        let result = self.change_finder_run(accounts, technologies).await;
        self.fail_manual_run(result).await
    }

    /// 계정 × 기술 집합을 감사합니다.
    ///
    /// 배치 기술도 감사 대상에 포함됩니다 (`skip_batch = false`).
    pub async fn run_audit(
        &self,
        accounts: &[String],
        technologies: &[String],
        send_report: bool,
    ) -> Result<(), VigilError> {
        info!(send_report, "executing manual audit task");
        self.audit()
            .audit_changes(accounts, technologies, send_report, self.debug, false)
            .await?;
        info!("completed manual audit");
        Ok(())
    }

    async fn change_reporter(&self, accounts: &[String]) -> Result<ManualRunSummary, VigilError> {
        let mut summary = ManualRunSummary::default();
        for account in accounts {
            let started = Instant::now();
            let technologies: Vec<String> = self
                .provider
                .resolve_monitors(account, None, self.debug)
                .await?
                .iter()
                .filter_map(|monitor| monitor.watcher.as_deref())
                .map(|watcher| watcher.index().to_owned())
                .collect();

            for technology in &technologies {
                info!(account = %account, technology = %technology, "running change finder");
                self.executor.reporter_logic(account, technology).await?;
                summary.processed.push(format!("{account}/{technology}"));
            }

            summary.accounts += 1;
            info!(
                account = %account,
                elapsed_ms = elapsed_ms(started),
                "run account completed"
            );
        }
        info!("completed manual change reporting");
        Ok(summary)
    }

    async fn change_finder_run(
        &self,
        accounts: &[String],
        technologies: &[String],
    ) -> Result<ManualRunSummary, VigilError> {
        let mut summary = ManualRunSummary::default();
        for account in accounts {
            let started = Instant::now();
            for technology in technologies {
                let monitors = self
                    .finder
                    .find_changes(account, std::slice::from_ref(technology), self.debug)
                    .await?;
                summary.processed.extend(
                    monitors
                        .iter()
                        .map(|monitor| format!("{account}/{}", monitor.technology)),
                );
            }

            summary.accounts += 1;
            info!(
                account = %account,
                elapsed_ms = elapsed_ms(started),
                "run account completed"
            );
        }
        info!("completed manual change finder");
        Ok(summary)
    }

    async fn fail_manual_run<T>(&self, result: Result<T, VigilError>) -> Result<T, VigilError> {
        if let Err(e) = &result {
            if e.is_transient_storage() {
                error!(error = %e, "database error processing, cleaning up session");
                self.persistence.reset_session();
                self.recorder.record(SOURCE_RUN_CHANGE_REPORTER, None, e).await;
            }
        }
        result
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
