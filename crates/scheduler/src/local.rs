//! 프로세스 내 작업 큐 -- tokio 타이머 기반 [`TaskQueue`] 구현
//!
//! 등록마다 타이머 태스크 하나를 띄우고, 발화 시 워커 세마포어를 획득한 뒤
//! [`TaskHandler`]를 호출합니다.
//!
//! # 정리(purge)
//! 모든 타이머는 현재 세대의 [`CancellationToken`]을 공유합니다.
//! `purge_all_pending()`은 이 토큰을 취소하고 새 세대를 시작하므로 대기 중인
//! 타이머만 사라지고, 이미 디스패치된 실행은 끝까지 진행됩니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use vigil_core::error::{SchedulerError, VigilError};
use vigil_core::metrics as m;

use crate::queue::{Cadence, ClockSpec, RegistrationId, TaskHandler, TaskKind, TaskQueue};

/// 대기 중인 등록 정보
#[derive(Debug, Clone)]
struct PendingEntry {
    task: TaskKind,
    cadence: Cadence,
}

struct QueueState {
    generation: CancellationToken,
    closed: bool,
}

/// tokio 기반 프로세스 내 작업 큐
pub struct LocalTaskQueue {
    handler: Arc<dyn TaskHandler>,
    runtime: Handle,
    workers: Arc<Semaphore>,
    permits: u32,
    state: Mutex<QueueState>,
    pending: Arc<Mutex<HashMap<RegistrationId, PendingEntry>>>,
}

impl LocalTaskQueue {
    /// 현재 tokio 런타임에서 큐를 생성합니다.
    ///
    /// `concurrency`는 동시에 실행 가능한 작업 수입니다 (최소 1).
    pub fn new(handler: Arc<dyn TaskHandler>, concurrency: usize) -> Result<Self, VigilError> {
        let runtime = Handle::try_current()
            .map_err(|e| SchedulerError::Registration(format!("no tokio runtime: {e}")))?;
        let permits = u32::try_from(concurrency.max(1)).unwrap_or(u32::MAX >> 4);

        Ok(Self {
            handler,
            runtime,
            workers: Arc::new(Semaphore::new(permits as usize)),
            permits,
            state: Mutex::new(QueueState {
                generation: CancellationToken::new(),
                closed: false,
            }),
            pending: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// 대기 중인 등록 수
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// 대기 중인 등록 목록 (작업, 주기)
    pub fn pending(&self) -> Vec<(TaskKind, Cadence)> {
        self.pending
            .lock()
            .values()
            .map(|e| (e.task.clone(), e.cadence.clone()))
            .collect()
    }

    /// 큐를 닫고 대기 중인 등록을 모두 제거한 뒤, 실행 중인 작업이 끝날 때까지 기다립니다.
    pub async fn shutdown(&self) {
        let purged = self.purge_all_pending();
        self.state.lock().closed = true;
        info!(purged, "task queue closed, waiting for in-flight tasks");

        match self.workers.acquire_many(self.permits).await {
            Ok(_permits) => info!("all in-flight tasks completed"),
            Err(e) => warn!(error = %e, "worker semaphore closed during shutdown"),
        }
    }

    fn register(&self, task: TaskKind, cadence: Cadence) -> Result<RegistrationId, VigilError> {
        let token = {
            let state = self.state.lock();
            if state.closed {
                return Err(SchedulerError::QueueClosed.into());
            }
            state.generation.child_token()
        };

        let id = Uuid::new_v4();
        {
            let mut pending = self.pending.lock();
            pending.insert(
                id,
                PendingEntry {
                    task: task.clone(),
                    cadence: cadence.clone(),
                },
            );
            set_pending_gauge(pending.len());
        }

        debug!(%id, task = %task, ?cadence, "registering task");
        counter!(m::SCHEDULER_REGISTRATIONS_TOTAL, m::LABEL_TASK => task.name()).increment(1);

        let timer = Timer {
            id,
            task,
            cadence,
            token,
            handler: Arc::clone(&self.handler),
            workers: Arc::clone(&self.workers),
            pending: Arc::clone(&self.pending),
            runtime: self.runtime.clone(),
        };
        self.runtime.spawn(timer.run());

        Ok(id)
    }
}

impl TaskQueue for LocalTaskQueue {
    fn schedule_once(&self, task: TaskKind) -> Result<RegistrationId, VigilError> {
        self.register(task, Cadence::Once)
    }

    fn schedule_periodic(
        &self,
        interval: Duration,
        task: TaskKind,
    ) -> Result<RegistrationId, VigilError> {
        if interval.is_zero() {
            return Err(SchedulerError::Registration(format!(
                "periodic interval for {task} must be greater than zero"
            ))
            .into());
        }
        self.register(task, Cadence::Every(interval))
    }

    fn schedule_at_clock(
        &self,
        spec: ClockSpec,
        task: TaskKind,
    ) -> Result<RegistrationId, VigilError> {
        self.register(task, Cadence::Clock(spec))
    }

    fn purge_all_pending(&self) -> usize {
        {
            let mut state = self.state.lock();
            state.generation.cancel();
            state.generation = CancellationToken::new();
        }
        let mut pending = self.pending.lock();
        let purged = pending.len();
        pending.clear();
        set_pending_gauge(0);
        if purged > 0 {
            info!(purged, "purged pending task registrations");
        }
        purged
    }
}

impl std::fmt::Debug for LocalTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTaskQueue")
            .field("permits", &self.permits)
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// 등록 하나의 타이머 태스크
struct Timer {
    id: RegistrationId,
    task: TaskKind,
    cadence: Cadence,
    token: CancellationToken,
    handler: Arc<dyn TaskHandler>,
    workers: Arc<Semaphore>,
    pending: Arc<Mutex<HashMap<RegistrationId, PendingEntry>>>,
    runtime: Handle,
}

impl Timer {
    async fn run(self) {
        loop {
            let delay = match &self.cadence {
                Cadence::Once => Duration::ZERO,
                Cadence::Every(interval) => *interval,
                Cadence::Clock(spec) => match spec.until_next(Utc::now()) {
                    Some(delay) => delay,
                    None => {
                        warn!(task = %self.task, spec = %spec, "clock schedule has no upcoming run");
                        self.forget();
                        return;
                    }
                },
            };

            tokio::select! {
                biased;
                _ = self.token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            self.dispatch();

            if matches!(self.cadence, Cadence::Once) {
                self.forget();
                return;
            }
        }
    }

    fn forget(&self) {
        let mut pending = self.pending.lock();
        pending.remove(&self.id);
        set_pending_gauge(pending.len());
    }

    /// 작업을 워커에 넘깁니다. 디스패치된 실행은 취소되지 않습니다.
    fn dispatch(&self) {
        let task = self.task.clone();
        let handler = Arc::clone(&self.handler);
        let workers = Arc::clone(&self.workers);
        let span = info_span!("task", task = %task);

        self.runtime.spawn(
            async move {
                let _permit = match workers.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        warn!(error = %e, "worker pool closed, dropping task");
                        return;
                    }
                };

                if let Err(e) = handler.handle(task.clone()).await {
                    error!(error = %e, "task failed");
                    counter!(m::SCHEDULER_TASK_FAILURES_TOTAL, m::LABEL_TASK => task.name())
                        .increment(1);
                }
            }
            .instrument(span),
        );
    }
}

#[allow(clippy::cast_precision_loss)]
fn set_pending_gauge(len: usize) {
    gauge!(m::SCHEDULER_PENDING_REGISTRATIONS).set(len as f64);
}
