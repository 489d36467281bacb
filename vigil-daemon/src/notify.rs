//! Log-based alerting and issue tracker sync.
//!
//! Both collaborators read the shared [`ItemStore`] and emit structured
//! `tracing` events instead of talking to an external system.

use tracing::info;

use vigil_core::error::VigilError;
use vigil_core::monitor::{BoxFuture, Monitor};
use vigil_core::notify::{Alerter, IssueTrackerSync};

use crate::technologies::ItemStore;

/// Alerter that logs the current item and issue counts of each watched monitor.
#[derive(Debug, Clone)]
pub struct LogAlerter {
    store: ItemStore,
}

impl LogAlerter {
    pub fn new(store: ItemStore) -> Self {
        Self { store }
    }
}

impl Alerter for LogAlerter {
    fn send_alerts<'a>(
        &'a self,
        monitors: &'a [Monitor],
        account: &'a str,
    ) -> BoxFuture<'a, Result<(), VigilError>> {
        Box::pin(async move {
            for monitor in monitors {
                let Some(watcher) = monitor.watcher.as_deref() else {
                    continue;
                };
                let items = self.store.items(&monitor.technology, account).len();
                let issues = self.store.issues(&monitor.technology, account);
                let max_score = issues.iter().map(|i| i.score).max().unwrap_or(0);
                info!(
                    account,
                    technology = %monitor.technology,
                    label = watcher.plural_label(),
                    items,
                    issues = issues.len(),
                    max_score,
                    "change alert"
                );
            }
            Ok(())
        })
    }
}

/// Issue tracker sync that logs every open issue once per sync.
#[derive(Debug, Clone)]
pub struct LogIssueSync {
    store: ItemStore,
}

impl LogIssueSync {
    pub fn new(store: ItemStore) -> Self {
        Self { store }
    }
}

impl IssueTrackerSync for LogIssueSync {
    fn sync_issues<'a>(
        &'a self,
        accounts: &'a [String],
        technology: &'a str,
    ) -> BoxFuture<'a, Result<(), VigilError>> {
        Box::pin(async move {
            for account in accounts {
                let issues = self.store.issues(technology, account);
                for issue in &issues {
                    info!(
                        account = %account,
                        technology,
                        item = %issue.item,
                        score = issue.score,
                        issue = %issue.issue,
                        "issue synced"
                    );
                }
                info!(
                    account = %account,
                    technology,
                    synced = issues.len(),
                    "issue tracker sync completed"
                );
            }
            Ok(())
        })
    }
}
