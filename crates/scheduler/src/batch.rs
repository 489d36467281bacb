//! 배치 컨슈머 -- 페이지 단위 watcher를 끝까지 소비하는 상태 기계
//!
//! ```text
//! FetchFirst ──(예외 맵 비어있지 않음)──▶ Abort
//!     │
//!     ▼
//! FetchPage ──(스트리밍 완료)──▶ Reconcile ──▶ Done
//!     │  ▲
//!     ▼  │
//!   AuditPage
//! ```
//!
//! 첫 목록 조회에서 예외가 하나라도 있으면 이번 주기는 수집 불가로 보고
//! 감사나 삭제 처리 없이 조용히 중단합니다. 예외 레코드도 남기지 않습니다.
//! 삭제 처리(`Reconcile`)는 마지막 페이지 감사 이후 정확히 한 번 실행됩니다.

use metrics::counter;
use tracing::{debug, error, info};

use vigil_core::error::VigilError;
use vigil_core::metrics as m;
use vigil_core::monitor::Monitor;
use vigil_core::types::Item;

use crate::audit::AuditOrchestrator;

/// 배치 컨슈머 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// 전체 목록 조회
    FetchFirst,
    /// 다음 페이지 조회
    FetchPage,
    /// 방금 조회한 페이지 감사
    AuditPage,
    /// 사라진 아이템 삭제 처리
    Reconcile,
    /// 수집 불가로 중단
    Abort,
    /// 정상 종료
    Done,
}

/// 배치 소비 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// 첫 조회가 모든 범위에서 실패하여 중단됨
    Aborted {
        /// 첫 번째 실패 범위의 리전 (없으면 `"unknown"`)
        region: String,
    },
    /// 모든 페이지를 처리하고 삭제 처리까지 완료됨
    Completed {
        /// 처리한 페이지 수
        pages: usize,
        /// 감사한 아이템 수
        audited: usize,
    },
}

/// 배치 컨슈머
#[derive(Debug, Clone, Copy)]
pub struct BatchConsumer<'a> {
    audit: &'a AuditOrchestrator,
}

impl<'a> BatchConsumer<'a> {
    /// 감사 오케스트레이터를 빌려 컨슈머를 생성합니다.
    pub fn new(audit: &'a AuditOrchestrator) -> Self {
        Self { audit }
    }

    /// 모니터의 watcher를 완료될 때까지 소비합니다.
    ///
    /// watcher가 없는 모니터는 아무 것도 하지 않고 `Completed { pages: 0 }`을 반환합니다.
    pub async fn consume(
        &self,
        monitor: &mut Monitor,
        account: &str,
    ) -> Result<BatchOutcome, VigilError> {
        let Monitor {
            technology,
            watcher,
            auditors,
            ..
        } = monitor;

        let Some(watcher) = watcher.as_deref_mut() else {
            return Ok(BatchOutcome::Completed {
                pages: 0,
                audited: 0,
            });
        };

        let mut state = BatchState::FetchFirst;
        let mut page: Vec<Item> = Vec::new();
        let mut pages = 0;
        let mut audited = 0;
        let mut abort_region = String::new();

        loop {
            state = match state {
                BatchState::FetchFirst => {
                    let listing = watcher.fetch_item_list().await?;
                    match listing.exceptions.keys().next() {
                        Some(scope) => {
                            abort_region = scope.region().unwrap_or("unknown").to_owned();
                            error!(
                                technology = watcher.plural_label(),
                                account,
                                region = %abort_region,
                                "exceptions have caused nothing to be fetched, cannot continue for this watcher"
                            );
                            BatchState::Abort
                        }
                        None => {
                            debug!(
                                technology = watcher.plural_label(),
                                account,
                                expected = listing.items.len(),
                                "fetched full item list"
                            );
                            BatchState::FetchPage
                        }
                    }
                }
                BatchState::FetchPage => {
                    if watcher.is_streaming_complete() {
                        BatchState::Reconcile
                    } else {
                        debug!(
                            technology = watcher.plural_label(),
                            account,
                            batch = watcher.page_size(),
                            "fetching a batch of items"
                        );
                        let fetched = watcher.fetch_page().await?;
                        page = watcher
                            .record_changes(fetched.items, &fetched.exceptions)
                            .await?;
                        BatchState::AuditPage
                    }
                }
                BatchState::AuditPage => {
                    self.audit
                        .audit_items(technology.as_str(), auditors.as_slice(), account, &page, false)
                        .await?;
                    pages += 1;
                    audited += page.len();
                    counter!(m::BATCH_PAGES_TOTAL, m::LABEL_TECHNOLOGY => technology.clone())
                        .increment(1);
                    page.clear();
                    BatchState::FetchPage
                }
                BatchState::Reconcile => {
                    debug!(
                        technology = watcher.plural_label(),
                        account,
                        "deleting all items that no longer exist"
                    );
                    watcher.reconcile_deletions(account).await?;
                    BatchState::Done
                }
                BatchState::Abort => {
                    counter!(m::BATCH_ABORTS_TOTAL, m::LABEL_TECHNOLOGY => technology.clone())
                        .increment(1);
                    return Ok(BatchOutcome::Aborted {
                        region: abort_region,
                    });
                }
                BatchState::Done => {
                    info!(
                        technology = watcher.plural_label(),
                        account, pages, audited, "batch cycle completed"
                    );
                    return Ok(BatchOutcome::Completed { pages, audited });
                }
            };
        }
    }
}
