//! In-process item and issue store shared by the snapshot watchers and
//! rule auditors.
//!
//! Items are keyed by `(technology, account)` and then by [`Item::key`].
//! Issues are kept per audited item key so a batch page audit only replaces
//! the issues of the items on that page.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;

use vigil_core::types::{Issue, Item};

type Scope = (String, String);

#[derive(Debug, Default)]
struct StoreState {
    items: BTreeMap<Scope, BTreeMap<String, Item>>,
    issues: BTreeMap<Scope, BTreeMap<String, Vec<Issue>>>,
}

/// Shared handle to the daemon's item store.
///
/// Cloning is cheap; all clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    inner: Arc<Mutex<StoreState>>,
}

impl ItemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored items of one technology in one account, ordered by key.
    pub fn items(&self, technology: &str, account: &str) -> Vec<Item> {
        self.inner
            .lock()
            .items
            .get(&scope(technology, account))
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Insert or replace an item. Returns `true` when the stored configuration changed.
    pub fn upsert(&self, item: Item) -> bool {
        let mut state = self.inner.lock();
        let items = state
            .items
            .entry(scope(&item.technology, &item.account))
            .or_default();
        match items.get(&item.key()) {
            Some(existing) if existing == &item => false,
            _ => {
                items.insert(item.key(), item);
                true
            }
        }
    }

    /// Drop every item whose key is not in `keep`, together with its issues.
    /// Returns the removed keys.
    pub fn retain_keys(
        &self,
        technology: &str,
        account: &str,
        keep: &BTreeSet<String>,
    ) -> Vec<String> {
        let scope = scope(technology, account);
        let mut state = self.inner.lock();
        let Some(items) = state.items.get_mut(&scope) else {
            return Vec::new();
        };
        let removed: Vec<String> = items
            .keys()
            .filter(|key| !keep.contains(*key))
            .cloned()
            .collect();
        for key in &removed {
            items.remove(key);
        }
        if let Some(issues) = state.issues.get_mut(&scope) {
            issues.retain(|key, _| !removed.contains(key));
        }
        removed
    }

    /// Replace the issues of the audited items of one technology in one account.
    ///
    /// Audited items without a matching issue end up with none.
    pub fn replace_issues(
        &self,
        technology: &str,
        account: &str,
        audited: &BTreeSet<String>,
        issues: &[Issue],
    ) {
        let mut state = self.inner.lock();
        let stored = state.issues.entry(scope(technology, account)).or_default();
        stored.retain(|key, _| !audited.contains(key));
        for issue in issues {
            stored
                .entry(issue.item.clone())
                .or_default()
                .push(issue.clone());
        }
    }

    /// Drop issues whose item key is not in `live`.
    pub fn prune_issues(&self, technology: &str, account: &str, live: &BTreeSet<String>) {
        if let Some(issues) = self
            .inner
            .lock()
            .issues
            .get_mut(&scope(technology, account))
        {
            issues.retain(|key, _| live.contains(key));
        }
    }

    /// Current issues of one technology in one account, ordered by item key.
    pub fn issues(&self, technology: &str, account: &str) -> Vec<Issue> {
        self.inner
            .lock()
            .issues
            .get(&scope(technology, account))
            .map(|issues| issues.values().flatten().cloned().collect())
            .unwrap_or_default()
    }
}

fn scope(technology: &str, account: &str) -> Scope {
    (technology.to_owned(), account.to_owned())
}
