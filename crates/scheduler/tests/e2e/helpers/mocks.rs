//! Mock collaborators for E2E scheduling tests.
//!
//! Provides scriptable watchers and auditors, a recording alerter and
//! issue-tracker sync, a recording task queue, and a provider wrapper that
//! fails on demand.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use vigil_core::error::{AuditError, CollectError, StorageError, VigilError};
use vigil_core::monitor::{Auditor, BoxFuture, Monitor, Watcher};
use vigil_core::notify::{Alerter, IssueTrackerSync};
use vigil_core::provider::MonitorProvider;
use vigil_core::types::{Account, ExceptionMap, FetchResult, Issue, Item, Report};
use vigil_scheduler::queue::{Cadence, ClockSpec, RegistrationId, TaskKind, TaskQueue};

use super::journal::{Event, Journal};

// ---------------------------------------------------------------------------
// Fault injection
// ---------------------------------------------------------------------------

/// What kind of error a tripped fault produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// `StorageError::Statement` -- a transient storage fault.
    Transient,
    /// `StorageError::Query` -- a non-transient storage error.
    Fatal,
    /// `CollectError::Fetch` -- an unclassified task-body failure.
    Collect,
}

/// A fault that fires a bounded number of times, shared across clones.
#[derive(Debug, Clone)]
pub struct FaultPlan {
    kind: FaultKind,
    remaining: Arc<AtomicUsize>,
    tripped: Arc<AtomicUsize>,
}

impl FaultPlan {
    pub fn always(kind: FaultKind) -> Self {
        Self::times(kind, usize::MAX)
    }

    pub fn times(kind: FaultKind, count: usize) -> Self {
        Self {
            kind,
            remaining: Arc::new(AtomicUsize::new(count)),
            tripped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times this fault has fired.
    pub fn tripped(&self) -> usize {
        self.tripped.load(Ordering::SeqCst)
    }

    pub fn trip(&self, technology: &str) -> Result<(), VigilError> {
        let fire = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !fire {
            return Ok(());
        }
        self.tripped.fetch_add(1, Ordering::SeqCst);
        Err(match self.kind {
            FaultKind::Transient => {
                StorageError::Statement(format!("invalid transaction on {technology}")).into()
            }
            FaultKind::Fatal => StorageError::Query(format!("bad query on {technology}")).into(),
            FaultKind::Collect => CollectError::Fetch {
                technology: technology.to_owned(),
                reason: "throttled".to_owned(),
            }
            .into(),
        })
    }
}

fn trip(plan: &Option<FaultPlan>, technology: &str) -> Result<(), VigilError> {
    match plan {
        Some(plan) => plan.trip(technology),
        None => Ok(()),
    }
}

pub fn make_items(technology: &str, account: &str, offset: usize, count: usize) -> Vec<Item> {
    (offset..offset + count)
        .map(|i| Item {
            technology: technology.to_owned(),
            account: account.to_owned(),
            region: "us-east-1".to_owned(),
            name: format!("{technology}-{i}"),
            config: json!({ "index": i }),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

/// Script describing how a mock watcher behaves.
#[derive(Debug, Clone, Default)]
pub struct WatcherScript {
    pub technology: String,
    pub interval_minutes: u64,
    /// Page sizes for batch technologies.
    pub pages: Vec<usize>,
    /// Items returned by a snapshot fetch.
    pub snapshot_items: usize,
    /// Exceptions returned by the first batch fetch.
    pub list_exceptions: ExceptionMap,
    /// Fault tripped on snapshot and page fetches.
    pub fetch_fault: Option<FaultPlan>,
}

pub struct MockWatcher {
    script: WatcherScript,
    account: String,
    journal: Journal,
    pending_pages: VecDeque<usize>,
    served: usize,
}

impl MockWatcher {
    pub fn new(script: &WatcherScript, account: &str, journal: &Journal) -> Self {
        Self {
            script: script.clone(),
            account: account.to_owned(),
            journal: journal.clone(),
            pending_pages: script.pages.iter().copied().collect(),
            served: 0,
        }
    }

    fn technology(&self) -> String {
        self.script.technology.clone()
    }
}

impl Watcher for MockWatcher {
    fn index(&self) -> &str {
        &self.script.technology
    }

    fn plural_label(&self) -> &str {
        &self.script.technology
    }

    fn interval_minutes(&self) -> u64 {
        self.script.interval_minutes
    }

    fn page_size(&self) -> usize {
        self.script.pages.first().copied().unwrap_or(0)
    }

    fn fetch_snapshot(&mut self) -> BoxFuture<'_, Result<FetchResult, VigilError>> {
        Box::pin(async move {
            trip(&self.script.fetch_fault, &self.script.technology)?;
            self.journal.push(Event::Snapshot {
                technology: self.technology(),
            });
            Ok(FetchResult::ok(make_items(
                &self.script.technology,
                &self.account,
                0,
                self.script.snapshot_items,
            )))
        })
    }

    fn fetch_item_list(&mut self) -> BoxFuture<'_, Result<FetchResult, VigilError>> {
        Box::pin(async move {
            self.journal.push(Event::FetchList {
                technology: self.technology(),
            });
            let total: usize = self.script.pages.iter().sum();
            let items = if self.script.list_exceptions.is_empty() {
                make_items(&self.script.technology, &self.account, 0, total)
            } else {
                Vec::new()
            };
            Ok(FetchResult {
                items,
                exceptions: self.script.list_exceptions.clone(),
            })
        })
    }

    fn fetch_page(&mut self) -> BoxFuture<'_, Result<FetchResult, VigilError>> {
        Box::pin(async move {
            trip(&self.script.fetch_fault, &self.script.technology)?;
            let size = self.pending_pages.pop_front().unwrap_or(0);
            self.journal.push(Event::FetchPage {
                technology: self.technology(),
                size,
            });
            let items = make_items(&self.script.technology, &self.account, self.served, size);
            self.served += size;
            Ok(FetchResult::ok(items))
        })
    }

    fn is_streaming_complete(&self) -> bool {
        self.pending_pages.is_empty()
    }

    fn record_changes<'a>(
        &'a mut self,
        current: Vec<Item>,
        _exceptions: &'a ExceptionMap,
    ) -> BoxFuture<'a, Result<Vec<Item>, VigilError>> {
        Box::pin(async move {
            self.journal.push(Event::Recorded {
                technology: self.technology(),
                items: current.len(),
            });
            Ok(current)
        })
    }

    fn persist_snapshot(&mut self) -> BoxFuture<'_, Result<(), VigilError>> {
        Box::pin(async move {
            self.journal.push(Event::Persisted {
                technology: self.technology(),
            });
            Ok(())
        })
    }

    fn reconcile_deletions<'a>(
        &'a mut self,
        account: &'a str,
    ) -> BoxFuture<'a, Result<(), VigilError>> {
        Box::pin(async move {
            self.journal.push(Event::Reconciled {
                technology: self.technology(),
                account: account.to_owned(),
            });
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Auditor
// ---------------------------------------------------------------------------

/// Script describing how a mock auditor behaves.
#[derive(Debug, Clone, Default)]
pub struct AuditorScript {
    pub technology: String,
    /// Items returned by `load_persisted_items`.
    pub stored_items: usize,
    /// Fault tripped when persisting issues.
    pub persist_fault: Option<FaultPlan>,
}

pub struct MockAuditor {
    script: AuditorScript,
    account: String,
    journal: Journal,
}

impl MockAuditor {
    pub fn new(script: &AuditorScript, account: &str, journal: &Journal) -> Self {
        Self {
            script: script.clone(),
            account: account.to_owned(),
            journal: journal.clone(),
        }
    }
}

impl Auditor for MockAuditor {
    fn index(&self) -> &str {
        &self.script.technology
    }

    fn load_persisted_items(&self) -> BoxFuture<'_, Result<Vec<Item>, VigilError>> {
        Box::pin(async move {
            self.journal.push(Event::Loaded {
                technology: self.script.technology.clone(),
            });
            Ok(make_items(
                &self.script.technology,
                &self.account,
                0,
                self.script.stored_items,
            ))
        })
    }

    fn evaluate<'a>(&'a self, items: &'a [Item]) -> BoxFuture<'a, Result<Vec<Issue>, VigilError>> {
        Box::pin(async move {
            self.journal.push(Event::Audited {
                technology: self.script.technology.clone(),
                items: items.len(),
            });
            Ok(items
                .iter()
                .take(1)
                .map(|item| Issue {
                    technology: item.technology.clone(),
                    account: item.account.clone(),
                    item: item.key(),
                    issue: "mock finding".to_owned(),
                    score: 1,
                    notes: None,
                })
                .collect())
        })
    }

    fn persist_issues<'a>(&'a self, _issues: &'a [Issue]) -> BoxFuture<'a, Result<(), VigilError>> {
        Box::pin(async move { trip(&self.script.persist_fault, &self.script.technology) })
    }

    fn render_report(&self, issues: &[Issue]) -> Result<Report, VigilError> {
        if self.script.technology.is_empty() {
            return Err(AuditError::Report {
                technology: String::new(),
                reason: "no technology".to_owned(),
            }
            .into());
        }
        Ok(Report {
            technology: self.script.technology.clone(),
            account: self.account.clone(),
            issue_count: issues.len(),
            body: format!("{} issue(s)", issues.len()),
        })
    }

    fn deliver_report(&self, report: Report) -> BoxFuture<'_, Result<(), VigilError>> {
        Box::pin(async move {
            self.journal.push(Event::Reported {
                technology: report.technology,
            });
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Alerter / issue sync
// ---------------------------------------------------------------------------

pub struct RecordingAlerter {
    journal: Journal,
    pub fault: Option<FaultPlan>,
}

impl RecordingAlerter {
    pub fn new(journal: &Journal, fault: Option<FaultPlan>) -> Self {
        Self {
            journal: journal.clone(),
            fault,
        }
    }
}

impl Alerter for RecordingAlerter {
    fn send_alerts<'a>(
        &'a self,
        monitors: &'a [Monitor],
        account: &'a str,
    ) -> BoxFuture<'a, Result<(), VigilError>> {
        Box::pin(async move {
            trip(&self.fault, "alerter")?;
            self.journal.push(Event::Alerted {
                account: account.to_owned(),
                monitors: monitors.iter().map(|m| m.technology.clone()).collect(),
            });
            Ok(())
        })
    }
}

pub struct RecordingIssueSync {
    journal: Journal,
}

impl RecordingIssueSync {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
        }
    }
}

impl IssueTrackerSync for RecordingIssueSync {
    fn sync_issues<'a>(
        &'a self,
        accounts: &'a [String],
        technology: &'a str,
    ) -> BoxFuture<'a, Result<(), VigilError>> {
        Box::pin(async move {
            self.journal.push(Event::Synced {
                technology: technology.to_owned(),
                accounts: accounts.to_vec(),
            });
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Task queue
// ---------------------------------------------------------------------------

/// Task queue that only records registrations.
#[derive(Default)]
pub struct RecordingQueue {
    registrations: Mutex<Vec<(Cadence, TaskKind)>>,
    purges: AtomicUsize,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrations(&self) -> Vec<(Cadence, TaskKind)> {
        self.registrations.lock().clone()
    }

    pub fn purges(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }

    pub fn once(&self) -> Vec<TaskKind> {
        self.filter(|c| matches!(c, Cadence::Once))
    }

    pub fn periodic(&self, interval: Duration) -> Vec<TaskKind> {
        self.filter(|c| matches!(c, Cadence::Every(d) if *d == interval))
    }

    pub fn clocked(&self) -> Vec<TaskKind> {
        self.filter(|c| matches!(c, Cadence::Clock(_)))
    }

    fn filter(&self, predicate: impl Fn(&Cadence) -> bool) -> Vec<TaskKind> {
        self.registrations
            .lock()
            .iter()
            .filter(|(cadence, _)| predicate(cadence))
            .map(|(_, task)| task.clone())
            .collect()
    }

    fn push(&self, cadence: Cadence, task: TaskKind) -> Result<RegistrationId, VigilError> {
        self.registrations.lock().push((cadence, task));
        Ok(uuid::Uuid::new_v4())
    }
}

impl TaskQueue for RecordingQueue {
    fn schedule_once(&self, task: TaskKind) -> Result<RegistrationId, VigilError> {
        self.push(Cadence::Once, task)
    }

    fn schedule_periodic(
        &self,
        interval: Duration,
        task: TaskKind,
    ) -> Result<RegistrationId, VigilError> {
        self.push(Cadence::Every(interval), task)
    }

    fn schedule_at_clock(
        &self,
        spec: ClockSpec,
        task: TaskKind,
    ) -> Result<RegistrationId, VigilError> {
        self.push(Cadence::Clock(spec), task)
    }

    fn purge_all_pending(&self) -> usize {
        self.purges.fetch_add(1, Ordering::SeqCst);
        let mut registrations = self.registrations.lock();
        let purged = registrations.len();
        registrations.clear();
        purged
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Provider wrapper whose account listing fails with a transient fault.
pub struct FailingAccountsProvider<P> {
    pub inner: P,
}

impl<P: MonitorProvider> MonitorProvider for FailingAccountsProvider<P> {
    fn list_active_first_party_accounts(&self) -> BoxFuture<'_, Result<Vec<Account>, VigilError>> {
        Box::pin(async {
            Err(StorageError::Connection("inventory unreachable".to_owned()).into())
        })
    }

    fn resolve_monitors<'a>(
        &'a self,
        account: &'a str,
        technologies: Option<&'a [String]>,
        debug: bool,
    ) -> BoxFuture<'a, Result<Vec<Monitor>, VigilError>> {
        self.inner.resolve_monitors(account, technologies, debug)
    }

    fn resolve_monitors_with_dependencies<'a>(
        &'a self,
        account: &'a str,
        technologies: &'a [String],
        debug: bool,
    ) -> BoxFuture<'a, Result<Vec<Monitor>, VigilError>> {
        self.inner
            .resolve_monitors_with_dependencies(account, technologies, debug)
    }
}
