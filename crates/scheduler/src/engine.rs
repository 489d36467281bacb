//! 엔진 조립 -- 협력자를 주입받아 오케스트레이션 컴포넌트를 구성
//!
//! # 사용 예시
//! ```ignore
//! let engine = EngineBuilder::new()
//!     .config(config.scheduler.clone())
//!     .provider(provider)
//!     .persistence(store)
//!     .alerter(alerter)
//!     .build()?;
//!
//! let queue = Arc::new(LocalTaskQueue::new(engine.task_handler(), 8)?);
//! engine.bootstrapper(queue)?.bootstrap().await;
//! ```

use std::sync::Arc;

use vigil_core::config::SchedulerConfig;
use vigil_core::error::{ConfigError, VigilError};
use vigil_core::notify::{Alerter, IssueTrackerSync};
use vigil_core::provider::MonitorProvider;
use vigil_core::store::Persistence;

use crate::audit::AuditOrchestrator;
use crate::bootstrap::SchedulerBootstrapper;
use crate::change_finder::ChangeFinder;
use crate::exceptions::ExceptionRecorder;
use crate::executor::TaskExecutor;
use crate::queue::{TaskHandler, TaskQueue};
use crate::retry::RetryPolicy;

/// 조립된 스케줄링 엔진
#[derive(Clone)]
pub struct Engine {
    pub(crate) config: SchedulerConfig,
    pub(crate) debug: bool,
    pub(crate) provider: Arc<dyn MonitorProvider>,
    pub(crate) persistence: Arc<dyn Persistence>,
    pub(crate) recorder: ExceptionRecorder,
    pub(crate) finder: ChangeFinder,
    pub(crate) executor: Arc<TaskExecutor>,
}

impl Engine {
    /// 엔진 빌더를 생성합니다.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// 스케줄러 설정
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// 예외 기록기
    pub fn recorder(&self) -> &ExceptionRecorder {
        &self.recorder
    }

    /// 감사 오케스트레이터
    pub fn audit(&self) -> &AuditOrchestrator {
        self.finder.audit()
    }

    /// 변경 탐지기
    pub fn change_finder(&self) -> &ChangeFinder {
        &self.finder
    }

    /// 작업 실행기
    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    /// 큐에 넘길 작업 처리기
    pub fn task_handler(&self) -> Arc<dyn TaskHandler> {
        Arc::clone(&self.executor) as Arc<dyn TaskHandler>
    }

    /// 주어진 큐에 스케줄을 등록하는 부트스트래퍼를 생성합니다.
    pub fn bootstrapper(
        &self,
        queue: Arc<dyn TaskQueue>,
    ) -> Result<SchedulerBootstrapper, VigilError> {
        SchedulerBootstrapper::new(
            Arc::clone(&self.provider),
            queue,
            self.recorder.clone(),
            &self.config,
            self.debug,
        )
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("debug", &self.debug)
            .field("executor", &self.executor)
            .finish()
    }
}

/// 엔진 빌더
#[derive(Default)]
pub struct EngineBuilder {
    config: SchedulerConfig,
    debug: bool,
    provider: Option<Arc<dyn MonitorProvider>>,
    persistence: Option<Arc<dyn Persistence>>,
    alerter: Option<Arc<dyn Alerter>>,
    issue_sync: Option<Arc<dyn IssueTrackerSync>>,
}

impl EngineBuilder {
    /// 기본 설정으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 스케줄러 설정
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// watcher/auditor 디버그 모드
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// 계정/모니터 제공자 (필수)
    pub fn provider(mut self, provider: Arc<dyn MonitorProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// 영속성 협력자 (필수)
    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// 알림 협력자 (필수)
    pub fn alerter(mut self, alerter: Arc<dyn Alerter>) -> Self {
        self.alerter = Some(alerter);
        self
    }

    /// 이슈 트래커 동기화 협력자 (선택)
    pub fn issue_sync(mut self, issue_sync: Arc<dyn IssueTrackerSync>) -> Self {
        self.issue_sync = Some(issue_sync);
        self
    }

    /// 엔진을 조립합니다.
    pub fn build(self) -> Result<Engine, VigilError> {
        self.config.validate()?;

        let provider = self.provider.ok_or_else(|| missing("provider"))?;
        let persistence = self.persistence.ok_or_else(|| missing("persistence"))?;
        let alerter = self.alerter.ok_or_else(|| missing("alerter"))?;

        let recorder =
            ExceptionRecorder::new(Arc::clone(&persistence), self.config.exception_ttl_days);
        let audit = AuditOrchestrator::new(
            Arc::clone(&provider),
            Arc::clone(&persistence),
            recorder.clone(),
            self.issue_sync,
        );
        let finder = ChangeFinder::new(Arc::clone(&provider), Arc::clone(&persistence), audit);
        let executor = Arc::new(TaskExecutor::new(
            finder.clone(),
            alerter,
            Arc::clone(&persistence),
            recorder.clone(),
            RetryPolicy::from_config(&self.config),
            self.debug,
        ));

        Ok(Engine {
            config: self.config,
            debug: self.debug,
            provider,
            persistence,
            recorder,
            finder,
            executor,
        })
    }
}

fn missing(field: &str) -> VigilError {
    ConfigError::InvalidValue {
        field: format!("engine.{field}"),
        reason: format!("{field} must be provided"),
    }
    .into()
}
