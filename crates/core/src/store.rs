//! 영속성 협력자: 예외 레코드 저장과 데이터 세션 관리
//!
//! 스케줄러가 영속성 계층에 요구하는 연산은 네 가지뿐입니다.
//! 예외 레코드 저장, 만료 레코드 삭제, 세션 폐기(reset), 세션 반환(close).
//!
//! 일시적 스토리지 장애를 감지한 컴포넌트는 반환/재발생 전에 반드시
//! [`Persistence::reset_session`]을 호출해야 합니다.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::VigilError;
use crate::monitor::BoxFuture;
use crate::types::ExceptionRecord;

/// 영속성 협력자
pub trait Persistence: Send + Sync {
    /// 예외 레코드를 저장합니다.
    fn record_exception(&self, record: ExceptionRecord) -> BoxFuture<'_, Result<(), VigilError>>;

    /// `now` 기준으로 만료된 예외 레코드를 삭제하고 삭제 건수를 반환합니다.
    fn purge_expired_exceptions(
        &self,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<usize, VigilError>>;

    /// 오염되었을 수 있는 세션을 폐기합니다.
    fn reset_session(&self);

    /// 정상 종료 시 세션을 반환합니다.
    fn close_session(&self);
}

/// 프로세스 내 메모리 저장소
///
/// 데몬의 기본 저장소이자 테스트용 구현입니다.
/// 재시작 시 레코드는 유지되지 않습니다.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ExceptionRecord>>,
    resets: AtomicU64,
    closes: AtomicU64,
}

impl MemoryStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 예외 레코드 복사본
    pub fn records(&self) -> Vec<ExceptionRecord> {
        self.records.lock().clone()
    }

    /// 주어진 source 태그의 레코드 수
    pub fn count_source(&self, source: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.source == source)
            .count()
    }

    /// 세션 폐기 횟수
    pub fn session_resets(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }

    /// 세션 반환 횟수
    pub fn session_closes(&self) -> u64 {
        self.closes.load(Ordering::Relaxed)
    }
}

impl Persistence for MemoryStore {
    fn record_exception(&self, record: ExceptionRecord) -> BoxFuture<'_, Result<(), VigilError>> {
        Box::pin(async move {
            self.records.lock().push(record);
            Ok(())
        })
    }

    fn purge_expired_exceptions(
        &self,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<usize, VigilError>> {
        Box::pin(async move {
            let mut records = self.records.lock();
            let before = records.len();
            records.retain(|r| !r.is_expired(now));
            Ok(before - records.len())
        })
    }

    fn reset_session(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    fn close_session(&self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }
}
