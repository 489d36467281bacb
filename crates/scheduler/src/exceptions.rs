//! 예외 기록기 -- 실패 단계 태그와 TTL을 붙여 예외 레코드를 저장합니다.
//!
//! 모든 컴포넌트는 실패를 포착하면 [`ExceptionRecorder::record`]를 호출합니다.
//! 기록 자체가 실패해도 원래 흐름을 방해하지 않도록 경고 로그만 남깁니다.

use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::counter;
use tracing::{info, warn};

use vigil_core::error::VigilError;
use vigil_core::metrics as m;
use vigil_core::store::Persistence;
use vigil_core::types::ExceptionRecord;

/// 부트스트랩 실패
pub const SOURCE_SCHEDULER: &str = "scheduler";
/// watch 작업 경계에서 포착된 실패
pub const SOURCE_WATCH_TASK: &str = "scheduler-exception-on-watch";
/// 감사 전용 작업 경계에서 포착된 실패
pub const SOURCE_AUDIT_TASK: &str = "scheduler-exception-on-audit";
/// 감사 시퀀스 중 일시적 스토리지 장애
pub const SOURCE_AUDIT_CHANGES: &str = "scheduler-audit-changes";
/// watch + alert 로직 중 일시적 스토리지 장애
pub const SOURCE_TASK_ACCOUNT_TECH: &str = "scheduler-task-account-tech";
/// 수동 실행 경로의 일시적 스토리지 장애
pub const SOURCE_RUN_CHANGE_REPORTER: &str = "scheduler-run-change-reporter";

/// 예외 기록기
#[derive(Clone)]
pub struct ExceptionRecorder {
    persistence: Arc<dyn Persistence>,
    ttl: Duration,
}

impl ExceptionRecorder {
    /// 저장소와 TTL(일)로 기록기를 생성합니다.
    pub fn new(persistence: Arc<dyn Persistence>, ttl_days: u32) -> Self {
        Self {
            persistence,
            ttl: Duration::days(i64::from(ttl_days)),
        }
    }

    /// 예외 레코드를 저장합니다.
    pub async fn record(&self, source: &str, entity_id: Option<String>, error: &VigilError) {
        let record = ExceptionRecord::new(
            source,
            entity_id,
            error.kind(),
            error.to_string(),
            self.ttl,
        );

        counter!(m::EXCEPTION_RECORDS_TOTAL, m::LABEL_SOURCE => source.to_owned()).increment(1);

        if let Err(e) = self.persistence.record_exception(record).await {
            warn!(
                source,
                original_error = %error,
                error = %e,
                "failed to store exception record"
            );
        }
    }

    /// 만료된 예외 레코드를 삭제합니다 (exception janitor 본체).
    pub async fn clear_expired(&self) -> Result<usize, VigilError> {
        info!("clearing out exceptions that have an expired TTL");
        let purged = self.persistence.purge_expired_exceptions(Utc::now()).await?;
        counter!(m::EXCEPTION_PURGED_TOTAL).increment(u64::try_from(purged).unwrap_or(u64::MAX));
        info!(purged, "completed clearing out expired exceptions");
        Ok(purged)
    }
}

impl std::fmt::Debug for ExceptionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionRecorder")
            .field("ttl_days", &self.ttl.num_days())
            .finish()
    }
}
