//! 모니터 trait: watcher / auditor 확장 포인트 정의
//!
//! 하나의 기술(technology)은 계정마다 [`Watcher`] 하나와 [`Auditor`] 여러 개로
//! 구성되며, 이 묶음을 [`Monitor`]라고 부릅니다.
//!
//! 모든 trait은 `BoxFuture`를 반환하여 `Box<dyn Watcher>` 형태로
//! 레지스트리에서 동적으로 생성/관리할 수 있습니다.
//!
//! # 배치 기술
//! ```text
//! fetch_item_list ─▶ (fetch_page ─▶ record_changes)* ─▶ reconcile_deletions
//! ```
//! 배치를 지원하지 않는 watcher는 `fetch_snapshot` 한 번으로 전체 상태를 가져옵니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::{CollectError, VigilError};
use crate::types::{ExceptionMap, FetchResult, Issue, Item, Report};

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 한 계정에 대한 한 기술의 리소스 수집기
pub trait Watcher: Send + Sync {
    /// 기술 식별자 (예: `"iamrole"`)
    fn index(&self) -> &str;

    /// 로그용 복수형 이름 (예: `"IAM Roles"`)
    fn plural_label(&self) -> &str;

    /// 수집 주기 (분)
    fn interval_minutes(&self) -> u64;

    /// 배치 한 페이지 크기 (로그용, 비배치 기술은 0)
    fn page_size(&self) -> usize {
        0
    }

    /// 전체 스냅샷을 한 번에 가져옵니다.
    fn fetch_snapshot(&mut self) -> BoxFuture<'_, Result<FetchResult, VigilError>>;

    /// 배치 수집 대상 전체 목록을 가져옵니다 (배치 첫 단계).
    fn fetch_item_list(&mut self) -> BoxFuture<'_, Result<FetchResult, VigilError>> {
        let technology = self.index().to_owned();
        Box::pin(async move { Err(CollectError::BatchUnsupported { technology }.into()) })
    }

    /// 다음 페이지를 가져옵니다.
    fn fetch_page(&mut self) -> BoxFuture<'_, Result<FetchResult, VigilError>> {
        let technology = self.index().to_owned();
        Box::pin(async move { Err(CollectError::BatchUnsupported { technology }.into()) })
    }

    /// 배치 스트리밍이 끝났는지 확인합니다.
    fn is_streaming_complete(&self) -> bool {
        true
    }

    /// 현재 상태를 이전 상태와 비교하여 변경분을 기록하고,
    /// 감사 대상 아이템을 반환합니다.
    fn record_changes<'a>(
        &'a mut self,
        current: Vec<Item>,
        exceptions: &'a ExceptionMap,
    ) -> BoxFuture<'a, Result<Vec<Item>, VigilError>>;

    /// 기록된 변경분을 저장합니다.
    fn persist_snapshot(&mut self) -> BoxFuture<'_, Result<(), VigilError>>;

    /// 이번 주기에 보이지 않은 아이템을 삭제 처리합니다 (배치 전용).
    fn reconcile_deletions<'a>(
        &'a mut self,
        account: &'a str,
    ) -> BoxFuture<'a, Result<(), VigilError>> {
        let _ = account;
        let technology = self.index().to_owned();
        Box::pin(async move { Err(CollectError::BatchUnsupported { technology }.into()) })
    }
}

/// 한 계정에 대한 한 기술의 규칙 평가기
pub trait Auditor: Send + Sync {
    /// 감사 대상 기술 식별자
    fn index(&self) -> &str;

    /// 이전에 저장된 아이템을 읽어옵니다.
    fn load_persisted_items(&self) -> BoxFuture<'_, Result<Vec<Item>, VigilError>>;

    /// 규칙을 평가하여 이슈를 생성합니다.
    fn evaluate<'a>(&'a self, items: &'a [Item]) -> BoxFuture<'a, Result<Vec<Issue>, VigilError>>;

    /// 이슈를 저장합니다.
    fn persist_issues<'a>(&'a self, issues: &'a [Issue]) -> BoxFuture<'a, Result<(), VigilError>>;

    /// 리포트를 렌더링합니다.
    fn render_report(&self, issues: &[Issue]) -> Result<Report, VigilError>;

    /// 리포트를 전송합니다.
    fn deliver_report(&self, report: Report) -> BoxFuture<'_, Result<(), VigilError>>;
}

/// 기술 하나의 watcher, auditor, 의존성 묶음
///
/// 스케줄링 패스마다 레지스트리로부터 새로 생성되며 영속화되지 않습니다.
pub struct Monitor {
    /// 기술 식별자
    pub technology: String,
    /// 수집기 (없으면 스케줄링 대상이 아님)
    pub watcher: Option<Box<dyn Watcher>>,
    /// 규칙 평가기 목록
    pub auditors: Vec<Box<dyn Auditor>>,
    /// 이 모니터의 규칙이 소비하는 기술 목록
    pub dependencies: Vec<String>,
    /// 배치 수집 지원 여부
    pub batch_support: bool,
}

impl Monitor {
    /// 주어진 기술에 의존하는지 확인합니다.
    pub fn depends_on(&self, technology: &str) -> bool {
        self.dependencies.iter().any(|d| d == technology)
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("technology", &self.technology)
            .field("has_watcher", &self.watcher.is_some())
            .field("auditors", &self.auditors.len())
            .field("dependencies", &self.dependencies)
            .field("batch_support", &self.batch_support)
            .finish()
    }
}
