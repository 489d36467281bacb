//! 재시도 정책 -- 작업 단위 재시도 횟수와 백오프

use std::time::Duration;

use vigil_core::config::{MAX_TASK_ATTEMPTS, SchedulerConfig};

/// 작업 실행기의 재시도 정책
///
/// `max_attempts`는 첫 시도를 포함하며 [`MAX_TASK_ATTEMPTS`]를 넘지 않습니다.
/// 백오프는 시도 횟수에 선형 비례합니다 (`base * attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
}

impl RetryPolicy {
    /// 정책을 생성합니다. 시도 횟수는 1..=3 범위로 고정됩니다.
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_TASK_ATTEMPTS),
            backoff_base,
        }
    }

    /// 스케줄러 설정에서 정책을 생성합니다.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    /// 최대 시도 횟수 (첫 시도 포함)
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `attempt`번째 시도(1부터) 전에 대기할 시간
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff_base * (attempt - 1)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_TASK_ATTEMPTS, Duration::from_secs(1))
    }
}
