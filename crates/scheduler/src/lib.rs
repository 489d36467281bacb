//! Vigil 스케줄러 -- watch/audit 스케줄링 및 오케스트레이션 엔진
//!
//! 활성 계정 × 기술마다 언제 watch를 돌리고 언제 감사만 돌릴지 결정하고,
//! 배치 기술과 스냅샷 기술을 다르게 소비하며, 기술 간 감사 의존성을 풀고,
//! 실패를 분류/기록/재시도합니다.
//!
//! # 데이터 흐름
//! ```text
//! SchedulerBootstrapper ──▶ TaskQueue ──▶ TaskExecutor
//!                                            │
//!                        ┌───────────────────┴──────────────┐
//!                        ▼                                  ▼
//!                   ChangeFinder ──▶ BatchConsumer    AuditOrchestrator
//!                        │                │                 ▲
//!                        └────────────────┴─────────────────┘
//!
//!         (실패 시 모든 단계에서) ──▶ ExceptionRecorder
//! ```
//!
//! # 모듈 구성
//! - [`bootstrap`]: 스케줄 재등록 패스
//! - [`executor`]: 작업 본문과 제한된 재시도 루프
//! - [`change_finder`]: 계정/기술 watch 후 의존 감사
//! - [`batch`]: 페이지 단위 watcher 소비 상태 기계
//! - [`audit`]: 의존 폐포 감사와 특정 아이템 감사
//! - [`exceptions`]: 예외 기록기와 source 태그
//! - [`queue`] / [`local`]: 작업 큐 추상화와 tokio 구현
//! - [`context`]: 작업 본문 실행 범위 (세션 해제 보장)
//! - [`retry`]: 재시도 정책
//! - [`engine`] / [`manual`]: 엔진 조립과 수동 실행 경로

pub mod audit;
pub mod batch;
pub mod bootstrap;
pub mod change_finder;
pub mod context;
pub mod engine;
pub mod exceptions;
pub mod executor;
pub mod local;
pub mod manual;
pub mod queue;
pub mod retry;

pub use audit::AuditOrchestrator;
pub use batch::{BatchConsumer, BatchOutcome, BatchState};
pub use bootstrap::{BootstrapSummary, SchedulerBootstrapper};
pub use change_finder::ChangeFinder;
pub use context::ExecutionScope;
pub use engine::{Engine, EngineBuilder};
pub use exceptions::ExceptionRecorder;
pub use executor::TaskExecutor;
pub use local::LocalTaskQueue;
pub use manual::ManualRunSummary;
pub use queue::{Cadence, ClockSpec, RegistrationId, TaskHandler, TaskKind, TaskQueue};
pub use retry::RetryPolicy;
