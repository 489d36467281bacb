//! 감사 오케스트레이터 -- 기술과 그 의존 모니터의 auditor 실행
//!
//! 두 가지 진입 모드를 제공합니다.
//!
//! 1. [`AuditOrchestrator::audit_changes`]: 계정 × 기술 집합 단위.
//!    요청 기술과 그 기술에 전이적으로 의존하는 모든 모니터를 감사합니다.
//! 2. [`AuditOrchestrator::audit_specific_changes`]: 호출자가 넘긴 아이템 집합으로
//!    모니터 하나를 감사합니다 (배치 컨슈머의 페이지 단위 감사).
//!
//! 두 모드 모두 일시적 스토리지 장애는 세션을 폐기하고 기록한 뒤
//! 다음 모니터로 넘어갑니다. 그 밖의 에러는 호출자에게 전파됩니다.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, info};

use vigil_core::error::VigilError;
use vigil_core::metrics as m;
use vigil_core::monitor::{Auditor, Monitor};
use vigil_core::notify::IssueTrackerSync;
use vigil_core::provider::MonitorProvider;
use vigil_core::store::Persistence;
use vigil_core::types::Item;

use crate::exceptions::{ExceptionRecorder, SOURCE_AUDIT_CHANGES};

/// 감사 오케스트레이터
#[derive(Clone)]
pub struct AuditOrchestrator {
    provider: Arc<dyn MonitorProvider>,
    persistence: Arc<dyn Persistence>,
    recorder: ExceptionRecorder,
    issue_sync: Option<Arc<dyn IssueTrackerSync>>,
}

impl AuditOrchestrator {
    /// 오케스트레이터를 생성합니다.
    pub fn new(
        provider: Arc<dyn MonitorProvider>,
        persistence: Arc<dyn Persistence>,
        recorder: ExceptionRecorder,
        issue_sync: Option<Arc<dyn IssueTrackerSync>>,
    ) -> Self {
        Self {
            provider,
            persistence,
            recorder,
            issue_sync,
        }
    }

    /// 계정마다 요청 기술과 그 기술에 의존하는 모니터를 감사합니다.
    ///
    /// 의존 폐포는 계정당 한 번 계산되므로 여러 기술이 공유하는 의존 모니터도
    /// 한 번만 감사됩니다.
    ///
    /// `skip_batch`가 참이면 배치 모니터는 건너뜁니다 (페이지 단위로 이미 감사됨).
    pub async fn audit_changes(
        &self,
        accounts: &[String],
        technologies: &[String],
        send_report: bool,
        debug: bool,
        skip_batch: bool,
    ) -> Result<(), VigilError> {
        for account in accounts {
            let monitors = self
                .provider
                .resolve_monitors_with_dependencies(account, technologies, debug)
                .await?;

            for monitor in &monitors {
                if monitor.batch_support && skip_batch {
                    debug!(
                        account = %account,
                        technology = %monitor.technology,
                        "skipping batch monitor already audited per page"
                    );
                    continue;
                }

                debug!(
                    account = %account,
                    technology = %monitor.technology,
                    "auditing account"
                );
                let result = self
                    .run_auditors(
                        &monitor.technology,
                        &monitor.auditors,
                        account,
                        None,
                        send_report,
                    )
                    .await;
                self.absorb_transient(result, account, &monitor.technology)
                    .await?;
            }
        }
        Ok(())
    }

    /// 모니터 하나를 호출자가 넘긴 아이템으로 감사합니다.
    pub async fn audit_specific_changes(
        &self,
        monitor: &Monitor,
        account: &str,
        items: &[Item],
        send_report: bool,
    ) -> Result<(), VigilError> {
        self.audit_items(
            &monitor.technology,
            &monitor.auditors,
            account,
            items,
            send_report,
        )
        .await
    }

    /// [`audit_specific_changes`](Self::audit_specific_changes)의 분해된 형태.
    ///
    /// watcher를 가변으로 빌린 상태에서 같은 모니터의 auditor를 실행할 때 사용합니다.
    pub async fn audit_items(
        &self,
        technology: &str,
        auditors: &[Box<dyn Auditor>],
        account: &str,
        items: &[Item],
        send_report: bool,
    ) -> Result<(), VigilError> {
        debug!(
            account,
            technology,
            items = items.len(),
            "auditing specific items"
        );
        let result = self
            .run_auditors(technology, auditors, account, Some(items), send_report)
            .await;
        self.absorb_transient(result, account, technology).await
    }

    async fn run_auditors(
        &self,
        technology: &str,
        auditors: &[Box<dyn Auditor>],
        account: &str,
        items: Option<&[Item]>,
        send_report: bool,
    ) -> Result<(), VigilError> {
        for auditor in auditors {
            let loaded;
            let items = match items {
                Some(items) => items,
                None => {
                    loaded = auditor.load_persisted_items().await?;
                    loaded.as_slice()
                }
            };

            let issues = auditor.evaluate(items).await?;
            auditor.persist_issues(&issues).await?;

            counter!(m::AUDIT_RUNS_TOTAL, m::LABEL_TECHNOLOGY => technology.to_owned())
                .increment(1);
            counter!(m::AUDIT_ISSUES_TOTAL, m::LABEL_TECHNOLOGY => technology.to_owned())
                .increment(issues.len() as u64);

            if send_report {
                let report = auditor.render_report(&issues)?;
                auditor.deliver_report(report).await?;
            }

            if let Some(sync) = &self.issue_sync {
                info!(
                    account,
                    auditor = auditor.index(),
                    "syncing issues with issue tracker"
                );
                sync.sync_issues(&[account.to_owned()], auditor.index())
                    .await?;
            }
        }
        Ok(())
    }

    /// 일시적 스토리지 장애는 기록 후 삼키고, 그 밖의 에러는 그대로 반환합니다.
    async fn absorb_transient(
        &self,
        result: Result<(), VigilError>,
        account: &str,
        technology: &str,
    ) -> Result<(), VigilError> {
        match result {
            Err(e) if e.is_transient_storage() => {
                error!(
                    account,
                    technology,
                    error = %e,
                    "database error processing audit, cleaning up session"
                );
                self.persistence.reset_session();
                self.recorder
                    .record(
                        SOURCE_AUDIT_CHANGES,
                        Some(format!("{account}/{technology}")),
                        &e,
                    )
                    .await;
                Ok(())
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for AuditOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditOrchestrator")
            .field("issue_sync", &self.issue_sync.is_some())
            .finish()
    }
}
