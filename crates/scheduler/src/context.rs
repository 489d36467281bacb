//! 실행 범위 -- 작업 본문 전후의 데이터 세션 획득/해제
//!
//! [`ExecutionScope`]는 작업 하나가 실행되는 동안 데이터 세션을 소유합니다.
//! 범위가 끝나면 (정상 종료, 에러, 패닉 모두) 세션을 반드시 해제합니다.
//!
//! - 정상 종료: `close_session()`
//! - 일시적 스토리지 장애 표시([`ExecutionScope::poison`]) 후 종료: `reset_session()`

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use vigil_core::error::VigilError;
use vigil_core::store::Persistence;

/// 작업 하나의 실행 범위
pub struct ExecutionScope {
    persistence: Arc<dyn Persistence>,
    label: String,
    started: Instant,
    poisoned: bool,
}

impl ExecutionScope {
    /// 범위를 시작합니다.
    pub fn enter(persistence: Arc<dyn Persistence>, label: impl Into<String>) -> Self {
        let label = label.into();
        debug!(scope = %label, "entering execution scope");
        Self {
            persistence,
            label,
            started: Instant::now(),
            poisoned: false,
        }
    }

    /// 세션이 오염되었음을 표시합니다. 범위 종료 시 세션을 폐기합니다.
    pub fn poison(&mut self) {
        self.poisoned = true;
    }

    /// 에러가 일시적 스토리지 장애이면 세션을 오염 상태로 표시합니다.
    pub fn observe(&mut self, error: &VigilError) {
        if error.is_transient_storage() {
            self.poison();
        }
    }

    /// 범위 시작 이후 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for ExecutionScope {
    fn drop(&mut self) {
        if self.poisoned {
            self.persistence.reset_session();
        } else {
            self.persistence.close_session();
        }
        debug!(
            scope = %self.label,
            poisoned = self.poisoned,
            elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "execution scope released"
        );
    }
}

impl std::fmt::Debug for ExecutionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionScope")
            .field("label", &self.label)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
