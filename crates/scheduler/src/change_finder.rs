//! 변경 탐지기 -- 계정/기술 하나의 watch 후 의존 감사
//!
//! 모니터마다 배치 기술이면 [`BatchConsumer`]로, 아니면 전체 스냅샷을 한 번
//! 가져와 변경분을 기록하고 저장합니다. 모든 모니터를 처리한 뒤 같은
//! 계정/기술 집합을 `send_report = false`, `skip_batch = true`로 감사합니다.
//!
//! 데이터 세션은 [`ExecutionScope`]가 성공/실패와 관계없이 해제합니다.

use std::sync::Arc;

use metrics::counter;
use tracing::info;

use vigil_core::error::VigilError;
use vigil_core::metrics as m;
use vigil_core::monitor::{Monitor, Watcher};
use vigil_core::provider::MonitorProvider;
use vigil_core::store::Persistence;

use crate::audit::AuditOrchestrator;
use crate::batch::{BatchConsumer, BatchOutcome};
use crate::context::ExecutionScope;

/// 변경 탐지기
#[derive(Clone)]
pub struct ChangeFinder {
    provider: Arc<dyn MonitorProvider>,
    persistence: Arc<dyn Persistence>,
    audit: AuditOrchestrator,
}

impl ChangeFinder {
    /// 변경 탐지기를 생성합니다.
    pub fn new(
        provider: Arc<dyn MonitorProvider>,
        persistence: Arc<dyn Persistence>,
        audit: AuditOrchestrator,
    ) -> Self {
        Self {
            provider,
            persistence,
            audit,
        }
    }

    /// 감사 오케스트레이터 참조
    pub fn audit(&self) -> &AuditOrchestrator {
        &self.audit
    }

    /// 계정의 기술들을 watch하고 의존 모니터를 감사한 뒤, 처리한 모니터를 반환합니다.
    pub async fn find_changes(
        &self,
        account: &str,
        technologies: &[String],
        debug: bool,
    ) -> Result<Vec<Monitor>, VigilError> {
        let mut scope = ExecutionScope::enter(
            Arc::clone(&self.persistence),
            format!("find_changes:{account}"),
        );
        let result = self.watch_and_audit(account, technologies, debug).await;
        if let Err(e) = &result {
            scope.observe(e);
        }
        result
    }

    async fn watch_and_audit(
        &self,
        account: &str,
        technologies: &[String],
        debug: bool,
    ) -> Result<Vec<Monitor>, VigilError> {
        let mut monitors = self
            .provider
            .resolve_monitors(account, Some(technologies), debug)
            .await?;

        for monitor in &mut monitors {
            info!(
                account,
                technology = %monitor.technology,
                "looking for changes"
            );

            if monitor.batch_support {
                let outcome = BatchConsumer::new(&self.audit)
                    .consume(monitor, account)
                    .await?;
                if let BatchOutcome::Aborted { region } = outcome {
                    info!(
                        account,
                        technology = %monitor.technology,
                        region = %region,
                        "batch cycle aborted, nothing fetched"
                    );
                }
            } else if let Some(watcher) = monitor.watcher.as_deref_mut() {
                watch_snapshot(watcher, account).await?;
            }
        }

        // 배치 모니터는 페이지 단위로 이미 감사되었으므로 건너뜁니다.
        self.audit
            .audit_changes(&[account.to_owned()], technologies, false, debug, true)
            .await?;

        Ok(monitors)
    }
}

/// 비배치 watcher의 전체 스냅샷 수집
async fn watch_snapshot(watcher: &mut dyn Watcher, account: &str) -> Result<(), VigilError> {
    let snapshot = watcher.fetch_snapshot().await?;
    counter!(m::WATCH_ITEMS_TOTAL, m::LABEL_TECHNOLOGY => watcher.index().to_owned())
        .increment(snapshot.items.len() as u64);

    let changed = watcher
        .record_changes(snapshot.items, &snapshot.exceptions)
        .await?;
    watcher.persist_snapshot().await?;

    info!(
        account,
        technology = watcher.plural_label(),
        changed = changed.len(),
        failed_scopes = snapshot.exceptions.len(),
        "snapshot watch completed"
    );
    Ok(())
}

impl std::fmt::Debug for ChangeFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFinder")
            .field("audit", &self.audit)
            .finish()
    }
}
