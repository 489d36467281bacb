//! 작업 실행기 -- 큐가 디스패치한 작업 본문과 제한된 재시도 루프
//!
//! | 작업 | 본문 | 실패 source |
//! |---|---|---|
//! | `task_account_tech` | change finder + alert | `scheduler-exception-on-watch` |
//! | `task_audit` | 감사 (`send_report = true`) | `scheduler-exception-on-audit` |
//! | `clear_expired_exceptions` | 만료 예외 정리 | - |
//!
//! watch/감사 작업은 실패할 때마다 예외를 기록하고 작업 전체를 다시 시도합니다.
//! 시도 횟수는 첫 시도를 포함해 [`RetryPolicy::max_attempts`]를 넘지 않으며,
//! 소진되면 [`SchedulerError::RetriesExhausted`]로 큐의 실패 경로에 넘깁니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{error, info};

use vigil_core::error::{SchedulerError, VigilError};
use vigil_core::metrics as m;
use vigil_core::monitor::{BoxFuture, Monitor};
use vigil_core::notify::Alerter;
use vigil_core::store::Persistence;

use crate::change_finder::ChangeFinder;
use crate::context::ExecutionScope;
use crate::exceptions::{
    ExceptionRecorder, SOURCE_AUDIT_TASK, SOURCE_TASK_ACCOUNT_TECH, SOURCE_WATCH_TASK,
};
use crate::queue::{TaskHandler, TaskKind};
use crate::retry::RetryPolicy;

/// 작업 실행기
#[derive(Clone)]
pub struct TaskExecutor {
    finder: ChangeFinder,
    alerter: Arc<dyn Alerter>,
    persistence: Arc<dyn Persistence>,
    recorder: ExceptionRecorder,
    retry: RetryPolicy,
    debug: bool,
}

impl TaskExecutor {
    /// 실행기를 생성합니다.
    pub fn new(
        finder: ChangeFinder,
        alerter: Arc<dyn Alerter>,
        persistence: Arc<dyn Persistence>,
        recorder: ExceptionRecorder,
        retry: RetryPolicy,
        debug: bool,
    ) -> Self {
        Self {
            finder,
            alerter,
            persistence,
            recorder,
            retry,
            debug,
        }
    }

    /// 재시도 정책
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// 계정/기술 watch 작업 (재시도 포함)
    pub async fn run_account_technology(
        &self,
        account: &str,
        technology: &str,
    ) -> Result<(), VigilError> {
        let task = TaskKind::account_technology(account, technology);
        info!(account, technology, "executing task for account and technology");

        self.with_retry(&task, SOURCE_WATCH_TASK, move || async move {
            let started = Instant::now();
            self.reporter_logic(account, technology).await?;
            info!(
                account,
                technology,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "run account for technology completed"
            );
            Ok(())
        })
        .await
    }

    /// 감사 전용 작업 (재시도 포함)
    pub async fn run_audit_only(&self, account: &str, technology: &str) -> Result<(), VigilError> {
        let task = TaskKind::audit_only(account, technology);
        info!(account, technology, "executing task to audit changes");

        let accounts = &[account.to_owned()];
        let technologies = &[technology.to_owned()];
        self.with_retry(&task, SOURCE_AUDIT_TASK, move || async move {
            self.finder
                .audit()
                .audit_changes(accounts, technologies, true, self.debug, true)
                .await
        })
        .await
    }

    /// 만료 예외 정리 작업
    pub async fn clear_expired_exceptions(&self) -> Result<usize, VigilError> {
        let mut scope = ExecutionScope::enter(
            Arc::clone(&self.persistence),
            TaskKind::ClearExpiredExceptions.name(),
        );
        let result = self.recorder.clear_expired().await;
        if let Err(e) = &result {
            scope.observe(e);
        }
        result
    }

    /// watch + alert 로직
    ///
    /// 일시적 스토리지 장애는 세션을 폐기하고 기록한 뒤 그대로 반환하여
    /// 바깥 재시도 루프가 작업 전체를 다시 시도하게 합니다.
    pub async fn reporter_logic(
        &self,
        account: &str,
        technology: &str,
    ) -> Result<Vec<Monitor>, VigilError> {
        let result = self.watch_and_alert(account, technology).await;
        if let Err(e) = &result {
            if e.is_transient_storage() {
                error!(
                    account,
                    technology,
                    error = %e,
                    "database error processing account and technology, cleaning up session"
                );
                self.persistence.reset_session();
                self.recorder
                    .record(
                        SOURCE_TASK_ACCOUNT_TECH,
                        Some(format!("{account}/{technology}")),
                        e,
                    )
                    .await;
            }
        }
        result
    }

    async fn watch_and_alert(
        &self,
        account: &str,
        technology: &str,
    ) -> Result<Vec<Monitor>, VigilError> {
        let monitors = self
            .finder
            .find_changes(account, &[technology.to_owned()], self.debug)
            .await?;

        info!(account, technology, "sending alerts (if applicable)");
        self.alerter.send_alerts(&monitors, account).await?;
        Ok(monitors)
    }

    /// 작업 본문을 최대 시도 횟수까지 실행합니다.
    ///
    /// 시도마다 [`ExecutionScope`]를 열고 닫습니다.
    async fn with_retry<F, Fut>(
        &self,
        task: &TaskKind,
        source: &'static str,
        mut body: F,
    ) -> Result<(), VigilError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), VigilError>>,
    {
        let max_attempts = self.retry.max_attempts();
        let started = Instant::now();
        let mut attempt = 1;

        let outcome = loop {
            let result = {
                let mut scope = ExecutionScope::enter(Arc::clone(&self.persistence), task.to_string());
                let result = body().await;
                if let Err(e) = &result {
                    scope.observe(e);
                }
                result
            };

            match result {
                Ok(()) => break Ok(()),
                Err(e) => {
                    error!(
                        task = %task,
                        attempt,
                        max_attempts,
                        error = %e,
                        "task scheduler exception"
                    );
                    self.recorder.record(source, task.entity_id(), &e).await;

                    if attempt >= max_attempts {
                        break Err(SchedulerError::RetriesExhausted {
                            task: task.to_string(),
                            attempts: attempt,
                            reason: e.to_string(),
                        }
                        .into());
                    }

                    attempt += 1;
                    counter!(m::SCHEDULER_TASK_RETRIES_TOTAL, m::LABEL_TASK => task.name())
                        .increment(1);
                    tokio::time::sleep(self.retry.backoff_for(attempt)).await;
                }
            }
        };

        let result_label = if outcome.is_ok() { "success" } else { "failure" };
        counter!(
            m::SCHEDULER_TASKS_TOTAL,
            m::LABEL_TASK => task.name(),
            m::LABEL_RESULT => result_label
        )
        .increment(1);
        histogram!(m::SCHEDULER_TASK_DURATION_SECONDS, m::LABEL_TASK => task.name())
            .record(started.elapsed().as_secs_f64());

        if outcome.is_ok() {
            info!(task = %task, attempts = attempt, "completed task");
        }
        outcome
    }
}

impl TaskHandler for TaskExecutor {
    fn handle(&self, task: TaskKind) -> BoxFuture<'_, Result<(), VigilError>> {
        Box::pin(async move {
            match &task {
                TaskKind::AccountTechnology {
                    account,
                    technology,
                } => self.run_account_technology(account, technology).await,
                TaskKind::AuditOnly {
                    account,
                    technology,
                } => self.run_audit_only(account, technology).await,
                TaskKind::ClearExpiredExceptions => {
                    self.clear_expired_exceptions().await.map(|_| ())
                }
            }
        })
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("retry", &self.retry)
            .field("debug", &self.debug)
            .finish()
    }
}
