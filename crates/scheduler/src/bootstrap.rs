//! 스케줄러 부트스트래퍼 -- 재구성 시점마다 전체 스케줄을 다시 등록
//!
//! # 등록 순서
//! 1. 큐의 대기 작업을 모두 제거 (이전 토폴로지의 스케줄이 남지 않도록)
//! 2. 활성 1st-party 계정 × watcher가 있는 모니터마다
//!    - 즉시 1회 watch 작업
//!    - `interval_minutes * 60`초 간격 watch 작업
//!    - 비배치 기술이면 감사 전용 작업 (기본: 평일 10:00 UTC)
//! 3. 만료 예외 정리 작업 (기본: 매일 03:00 UTC)
//!
//! 열거 중 에러가 나면 패스 전체를 중단하고 `"scheduler"` source로 기록합니다.
//! 이 패스를 다시 시도할 호출자가 없으므로 에러는 전파하지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, error, info};

use vigil_core::config::SchedulerConfig;
use vigil_core::error::{SchedulerError, VigilError};
use vigil_core::metrics as m;
use vigil_core::provider::MonitorProvider;

use crate::exceptions::{ExceptionRecorder, SOURCE_SCHEDULER};
use crate::queue::{ClockSpec, TaskKind, TaskQueue};

/// 부트스트랩 패스 결과 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    /// 제거된 이전 대기 작업 수
    pub purged: usize,
    /// 스케줄링된 계정 수
    pub accounts: usize,
    /// 즉시 실행 등록 수
    pub immediate: usize,
    /// 주기 실행 등록 수
    pub periodic: usize,
    /// 감사 전용 등록 수
    pub audit_only: usize,
}

/// 스케줄러 부트스트래퍼
pub struct SchedulerBootstrapper {
    provider: Arc<dyn MonitorProvider>,
    queue: Arc<dyn TaskQueue>,
    recorder: ExceptionRecorder,
    audit_clock: ClockSpec,
    janitor_clock: ClockSpec,
    debug: bool,
}

impl SchedulerBootstrapper {
    /// 부트스트래퍼를 생성합니다. cron 표현식이 잘못되면 에러를 반환합니다.
    pub fn new(
        provider: Arc<dyn MonitorProvider>,
        queue: Arc<dyn TaskQueue>,
        recorder: ExceptionRecorder,
        config: &SchedulerConfig,
        debug: bool,
    ) -> Result<Self, VigilError> {
        Ok(Self {
            provider,
            queue,
            recorder,
            audit_clock: ClockSpec::parse(&config.audit_cron)?,
            janitor_clock: ClockSpec::parse(&config.janitor_cron)?,
            debug,
        })
    }

    /// 스케줄을 다시 등록합니다.
    ///
    /// 실패하면 기록 후 `None`을 반환합니다.
    pub async fn bootstrap(&self) -> Option<BootstrapSummary> {
        match self.register_all().await {
            Ok(summary) => {
                counter!(m::SCHEDULER_BOOTSTRAPS_TOTAL, m::LABEL_RESULT => "success").increment(1);
                info!(
                    accounts = summary.accounts,
                    immediate = summary.immediate,
                    periodic = summary.periodic,
                    audit_only = summary.audit_only,
                    purged = summary.purged,
                    "scheduler bootstrap completed"
                );
                Some(summary)
            }
            Err(e) => {
                counter!(m::SCHEDULER_BOOTSTRAPS_TOTAL, m::LABEL_RESULT => "failure").increment(1);
                error!(error = %e, "scheduler exception");
                self.recorder.record(SOURCE_SCHEDULER, None, &e).await;
                None
            }
        }
    }

    async fn register_all(&self) -> Result<BootstrapSummary, VigilError> {
        let mut summary = BootstrapSummary {
            purged: self.queue.purge_all_pending(),
            ..BootstrapSummary::default()
        };
        debug!(purged = summary.purged, "purged tasks awaiting execution");

        let accounts = self.provider.list_active_first_party_accounts().await?;
        for account in &accounts {
            info!(
                account_type = %account.account_type,
                account = %account.name,
                "scheduling tasks for account"
            );
            let monitors = self
                .provider
                .resolve_monitors(&account.name, None, self.debug)
                .await?;

            for monitor in &monitors {
                let Some(watcher) = monitor.watcher.as_deref() else {
                    continue;
                };
                let technology = watcher.index();
                let minutes = watcher.interval_minutes();
                let interval = minutes.checked_mul(60).map(Duration::from_secs).ok_or_else(|| {
                    SchedulerError::Registration(format!(
                        "interval of {minutes} minutes for {}/{technology} is out of range",
                        account.name
                    ))
                })?;

                self.queue
                    .schedule_once(TaskKind::account_technology(&account.name, technology))?;
                summary.immediate += 1;

                self.queue.schedule_periodic(
                    interval,
                    TaskKind::account_technology(&account.name, technology),
                )?;
                summary.periodic += 1;
                debug!(
                    account = %account.name,
                    technology,
                    interval_secs = interval.as_secs(),
                    "scheduled immediate and periodic watch"
                );

                // 배치 기술은 페이지마다 스스로 감사하므로 안전망이 필요 없습니다.
                if !monitor.batch_support {
                    self.queue.schedule_at_clock(
                        self.audit_clock.clone(),
                        TaskKind::audit_only(&account.name, technology),
                    )?;
                    summary.audit_only += 1;
                    debug!(
                        account = %account.name,
                        technology,
                        clock = %self.audit_clock,
                        "scheduled audit safety net"
                    );
                }
            }
            summary.accounts += 1;
        }

        info!(clock = %self.janitor_clock, "scheduling task to clear out old exceptions");
        self.queue
            .schedule_at_clock(self.janitor_clock.clone(), TaskKind::ClearExpiredExceptions)?;

        Ok(summary)
    }
}

impl std::fmt::Debug for SchedulerBootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerBootstrapper")
            .field("audit_clock", &self.audit_clock)
            .field("janitor_clock", &self.janitor_clock)
            .field("debug", &self.debug)
            .finish()
    }
}
