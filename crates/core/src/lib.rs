//! Vigil 공통 크레이트
//!
//! 클라우드 계정의 리소스 상태를 주기적으로 수집(watch)하고 보안 규칙으로
//! 평가(audit)하는 시스템의 공통 타입, 협력자 trait, 에러, 설정을 정의합니다.
//!
//! # 모듈 구성
//!
//! - [`config`]: `vigil.toml` 설정 (`VigilConfig`)
//! - [`error`]: 에러 분류 (`VigilError`, 일시적 스토리지 장애 판별)
//! - [`types`]: 도메인 타입 (`Account`, `Item`, `Issue`, `ExceptionRecord`)
//! - [`monitor`]: watcher/auditor trait과 `Monitor`
//! - [`registry`]: 기술 식별자 → 생성자 정적 레지스트리
//! - [`provider`]: 계정/모니터 제공자
//! - [`store`]: 영속성 협력자와 메모리 저장소
//! - [`notify`]: 알림 / 이슈 트래커 동기화 협력자
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod provider;
pub mod registry;
pub mod store;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{
    AuditError, CollectError, ConfigError, RegistryError, SchedulerError, StorageError, VigilError,
};

// 설정
pub use config::VigilConfig;

// 협력자 trait
pub use monitor::{Auditor, BoxFuture, Monitor, Watcher};
pub use notify::{Alerter, IssueTrackerSync};
pub use provider::{MonitorProvider, StaticMonitorProvider};
pub use registry::{
    AuditorFactory, MonitorContext, TechnologyRegistration, TechnologyRegistry, WatcherFactory,
    auditor_factory, watcher_factory,
};
pub use store::{MemoryStore, Persistence};

// 도메인 타입
pub use types::{
    Account, AccountType, ExceptionMap, ExceptionRecord, FetchResult, Issue, Item, Report,
    ScopeKey,
};
