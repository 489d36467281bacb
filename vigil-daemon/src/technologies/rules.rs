//! Equality rule auditor.
//!
//! Each `[[technologies.rules]]` entry compares one top-level key of an
//! item's JSON configuration against a literal value and raises an issue on
//! a match. A technology with its own source directory audits its own
//! items; an audit-only technology audits the items of the technologies it
//! depends on.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use parking_lot::Mutex;
use tracing::{debug, info};

use vigil_core::config::RuleConfig;
use vigil_core::error::{AuditError, VigilError};
use vigil_core::monitor::{Auditor, BoxFuture};
use vigil_core::types::{Issue, Item, Report};

use super::TechnologySpec;
use super::store::ItemStore;

/// Auditor applying a technology's equality rules for one account.
pub struct RuleAuditor {
    technology: String,
    account: String,
    sources: Vec<String>,
    rules: Vec<RuleConfig>,
    store: ItemStore,
    audited: Mutex<BTreeSet<String>>,
}

impl RuleAuditor {
    /// Create an auditor for `account`.
    pub fn new(spec: &TechnologySpec, account: &str, store: ItemStore) -> Self {
        let sources = if spec.source_dir.is_some() {
            vec![spec.name.clone()]
        } else {
            spec.dependencies.clone()
        };
        Self {
            technology: spec.name.clone(),
            account: account.to_owned(),
            sources,
            rules: spec.rules.clone(),
            store,
            audited: Mutex::new(BTreeSet::new()),
        }
    }

    /// Technologies whose items this auditor evaluates.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    fn issue_key(&self, item: &Item) -> String {
        if item.technology == self.technology {
            item.key()
        } else {
            format!("{}:{}", item.technology, item.key())
        }
    }

    fn live_keys(&self) -> BTreeSet<String> {
        self.sources
            .iter()
            .flat_map(|source| self.store.items(source, &self.account))
            .map(|item| self.issue_key(&item))
            .collect()
    }
}

impl Auditor for RuleAuditor {
    fn index(&self) -> &str {
        &self.technology
    }

    fn load_persisted_items(&self) -> BoxFuture<'_, Result<Vec<Item>, VigilError>> {
        Box::pin(async move {
            let items: Vec<Item> = self
                .sources
                .iter()
                .flat_map(|source| self.store.items(source, &self.account))
                .collect();
            debug!(
                technology = %self.technology,
                account = %self.account,
                items = items.len(),
                "loaded persisted items"
            );
            Ok(items)
        })
    }

    fn evaluate<'a>(&'a self, items: &'a [Item]) -> BoxFuture<'a, Result<Vec<Issue>, VigilError>> {
        Box::pin(async move {
            let mut issues = Vec::new();
            let mut audited = BTreeSet::new();

            for item in items {
                if !self.sources.contains(&item.technology) {
                    return Err(AuditError::Evaluation {
                        technology: self.technology.clone(),
                        reason: format!("item {item} is not from an audited technology"),
                    }
                    .into());
                }
                let key = self.issue_key(item);
                for rule in &self.rules {
                    if item.config.get(&rule.key) == Some(&rule.equals) {
                        issues.push(Issue {
                            technology: self.technology.clone(),
                            account: self.account.clone(),
                            item: key.clone(),
                            issue: rule.issue.clone(),
                            score: rule.score,
                            notes: Some(format!("{} = {}", rule.key, rule.equals)),
                        });
                    }
                }
                audited.insert(key);
            }

            *self.audited.lock() = audited;
            Ok(issues)
        })
    }

    fn persist_issues<'a>(&'a self, issues: &'a [Issue]) -> BoxFuture<'a, Result<(), VigilError>> {
        Box::pin(async move {
            let audited = std::mem::take(&mut *self.audited.lock());
            self.store
                .replace_issues(&self.technology, &self.account, &audited, issues);
            self.store
                .prune_issues(&self.technology, &self.account, &self.live_keys());
            debug!(
                technology = %self.technology,
                account = %self.account,
                audited = audited.len(),
                issues = issues.len(),
                "issues persisted"
            );
            Ok(())
        })
    }

    fn render_report(&self, issues: &[Issue]) -> Result<Report, VigilError> {
        let mut body = format!(
            "{} issue(s) for {} in {}\n",
            issues.len(),
            self.technology,
            self.account
        );
        for issue in issues {
            writeln!(body, "  {issue}").map_err(|e| AuditError::Report {
                technology: self.technology.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(Report {
            technology: self.technology.clone(),
            account: self.account.clone(),
            issue_count: issues.len(),
            body,
        })
    }

    fn deliver_report(&self, report: Report) -> BoxFuture<'_, Result<(), VigilError>> {
        Box::pin(async move {
            info!(
                technology = %report.technology,
                account = %report.account,
                issues = report.issue_count,
                report = %report.body,
                "audit report"
            );
            Ok(())
        })
    }
}
