//! File-backed snapshot watcher.
//!
//! Reads one JSON document per resource from `<source_dir>/<account>/*.json`.
//! The file stem becomes the item name and the document's `"region"` field
//! (default `"global"`) its region. Files are visited in name order.
//!
//! Non-batch technologies stage changes in [`Watcher::record_changes`] and
//! commit them in [`Watcher::persist_snapshot`]. Batch technologies commit
//! each page as it is recorded and drop unseen items in
//! [`Watcher::reconcile_deletions`].

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use vigil_core::error::VigilError;
use vigil_core::monitor::{BoxFuture, Watcher};
use vigil_core::types::{ExceptionMap, FetchResult, Item, ScopeKey};

use super::TechnologySpec;
use super::store::ItemStore;

const DEFAULT_REGION: &str = "global";

/// Watcher over a directory of JSON item files for one account.
pub struct SnapshotWatcher {
    technology: String,
    plural: String,
    interval_minutes: u64,
    batch_size: usize,
    account: String,
    directory: PathBuf,
    store: ItemStore,
    queue: VecDeque<Item>,
    seen: BTreeSet<String>,
    staged: Vec<Item>,
    had_exceptions: bool,
}

impl SnapshotWatcher {
    /// Create a watcher for `account` reading below `source_dir`.
    pub fn new(spec: &TechnologySpec, source_dir: &Path, account: &str, store: ItemStore) -> Self {
        Self {
            technology: spec.name.clone(),
            plural: spec.plural.clone(),
            interval_minutes: spec.interval_minutes,
            batch_size: spec.batch_size,
            account: account.to_owned(),
            directory: source_dir.join(account),
            store,
            queue: VecDeque::new(),
            seen: BTreeSet::new(),
            staged: Vec::new(),
            had_exceptions: false,
        }
    }

    /// Directory this watcher reads from.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn begin_cycle(&mut self) {
        self.queue.clear();
        self.seen.clear();
        self.staged.clear();
        self.had_exceptions = false;
    }

    async fn read_items(&self) -> FetchResult {
        let mut exceptions = ExceptionMap::new();
        let paths = match list_json_files(&self.directory).await {
            Ok(paths) => paths,
            Err(e) => {
                warn!(
                    technology = %self.technology,
                    account = %self.account,
                    directory = %self.directory.display(),
                    error = %e,
                    "failed to list item files"
                );
                exceptions.insert(
                    ScopeKey::new([self.technology.as_str(), self.account.as_str()]),
                    e.to_string(),
                );
                return FetchResult {
                    items: Vec::new(),
                    exceptions,
                };
            }
        };

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            match self.read_item(&path).await {
                Ok(item) => items.push(item),
                Err(reason) => warn!(
                    technology = %self.technology,
                    account = %self.account,
                    path = %path.display(),
                    %reason,
                    "skipping unreadable item file"
                ),
            }
        }

        FetchResult { items, exceptions }
    }

    async fn read_item(&self, path: &Path) -> Result<Item, String> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| "file name is not valid UTF-8".to_owned())?
            .to_owned();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| e.to_string())?;
        let config: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| e.to_string())?;
        let region = config
            .get("region")
            .and_then(|r| r.as_str())
            .unwrap_or(DEFAULT_REGION)
            .to_owned();

        Ok(Item {
            technology: self.technology.clone(),
            account: self.account.clone(),
            region,
            name,
            config,
        })
    }

    fn drop_unseen(&self) -> usize {
        let removed = self
            .store
            .retain_keys(&self.technology, &self.account, &self.seen);
        for key in &removed {
            debug!(technology = %self.technology, account = %self.account, item = %key, "item deleted");
        }
        removed.len()
    }
}

async fn list_json_files(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(directory).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

impl Watcher for SnapshotWatcher {
    fn index(&self) -> &str {
        &self.technology
    }

    fn plural_label(&self) -> &str {
        &self.plural
    }

    fn interval_minutes(&self) -> u64 {
        self.interval_minutes
    }

    fn page_size(&self) -> usize {
        self.batch_size
    }

    fn fetch_snapshot(&mut self) -> BoxFuture<'_, Result<FetchResult, VigilError>> {
        Box::pin(async move {
            self.begin_cycle();
            let result = self.read_items().await;
            debug!(
                technology = %self.technology,
                account = %self.account,
                items = result.items.len(),
                "snapshot fetched"
            );
            Ok(result)
        })
    }

    fn fetch_item_list(&mut self) -> BoxFuture<'_, Result<FetchResult, VigilError>> {
        Box::pin(async move {
            self.begin_cycle();
            let result = self.read_items().await;
            if result.exceptions.is_empty() {
                self.queue = result.items.iter().cloned().collect();
            }
            Ok(result)
        })
    }

    fn fetch_page(&mut self) -> BoxFuture<'_, Result<FetchResult, VigilError>> {
        Box::pin(async move {
            let take = self.batch_size.max(1).min(self.queue.len());
            let page: Vec<Item> = self.queue.drain(..take).collect();
            Ok(FetchResult::ok(page))
        })
    }

    fn is_streaming_complete(&self) -> bool {
        self.queue.is_empty()
    }

    fn record_changes<'a>(
        &'a mut self,
        current: Vec<Item>,
        exceptions: &'a ExceptionMap,
    ) -> BoxFuture<'a, Result<Vec<Item>, VigilError>> {
        Box::pin(async move {
            if !exceptions.is_empty() {
                self.had_exceptions = true;
            }

            let batch = self.batch_size > 0;
            let stored = if batch {
                Vec::new()
            } else {
                self.store.items(&self.technology, &self.account)
            };
            let mut changed = Vec::new();
            for item in current {
                self.seen.insert(item.key());
                if batch {
                    if self.store.upsert(item.clone()) {
                        changed.push(item);
                    }
                } else if !stored.contains(&item) {
                    self.staged.push(item.clone());
                    changed.push(item);
                }
            }

            debug!(
                technology = %self.technology,
                account = %self.account,
                changed = changed.len(),
                "changes recorded"
            );
            Ok(changed)
        })
    }

    fn persist_snapshot(&mut self) -> BoxFuture<'_, Result<(), VigilError>> {
        Box::pin(async move {
            let staged = std::mem::take(&mut self.staged);
            let written = staged.len();
            for item in staged {
                self.store.upsert(item);
            }

            // A partial fetch cannot prove anything is gone.
            let deleted = if self.had_exceptions {
                0
            } else {
                self.drop_unseen()
            };

            info!(
                technology = %self.technology,
                account = %self.account,
                written,
                deleted,
                "snapshot persisted"
            );
            Ok(())
        })
    }

    fn reconcile_deletions<'a>(
        &'a mut self,
        account: &'a str,
    ) -> BoxFuture<'a, Result<(), VigilError>> {
        Box::pin(async move {
            let deleted = self.drop_unseen();
            info!(
                technology = %self.technology,
                account,
                seen = self.seen.len(),
                deleted,
                "deletions reconciled"
            );
            Ok(())
        })
    }
}
