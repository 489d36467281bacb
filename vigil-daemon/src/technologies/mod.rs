//! File-backed technologies assembled from `[[technologies]]`.
//!
//! Every configured technology is registered explicitly at startup:
//!
//! - with a `source_dir`, it gets a [`SnapshotWatcher`] reading
//!   `<data_dir>/<source_dir>/<account>/*.json` and a [`RuleAuditor`]
//!   over its own items;
//! - without one, it is audit-only and its [`RuleAuditor`] evaluates the
//!   items of the technologies it depends on.
//!
//! All watchers and auditors share one [`ItemStore`].

mod rules;
mod snapshot;
mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vigil_core::config::{RuleConfig, TechnologyConfig, VigilConfig};
use vigil_core::error::VigilError;
use vigil_core::monitor::{Auditor, Watcher};
use vigil_core::registry::{
    MonitorContext, TechnologyRegistration, TechnologyRegistry, auditor_factory, watcher_factory,
};

pub use rules::RuleAuditor;
pub use snapshot::SnapshotWatcher;
pub use store::ItemStore;

/// Resolved definition of one configured technology.
#[derive(Debug, Clone)]
pub struct TechnologySpec {
    /// Technology identifier.
    pub name: String,
    /// Label used in logs.
    pub plural: String,
    /// Watch interval in minutes.
    pub interval_minutes: u64,
    /// Page size; `0` means a single snapshot per cycle.
    pub batch_size: usize,
    /// Item file root, `None` for audit-only technologies.
    pub source_dir: Option<PathBuf>,
    /// Technologies this one's rules consume.
    pub dependencies: Vec<String>,
    /// Equality rules.
    pub rules: Vec<RuleConfig>,
}

impl TechnologySpec {
    /// Resolve a `[[technologies]]` entry against the data directory.
    ///
    /// A relative `source_dir` is joined onto `data_dir`; an empty one
    /// makes the technology audit-only.
    pub fn from_config(config: &TechnologyConfig, data_dir: &Path) -> Self {
        let plural = if config.plural.is_empty() {
            config.name.clone()
        } else {
            config.plural.clone()
        };
        let source_dir = (!config.source_dir.is_empty()).then(|| data_dir.join(&config.source_dir));

        Self {
            name: config.name.clone(),
            plural,
            interval_minutes: config.interval_minutes,
            batch_size: config.batch_size,
            source_dir,
            dependencies: config.dependencies.clone(),
            rules: config.rules.clone(),
        }
    }

    /// Whether the technology is watched page by page.
    pub fn is_batch(&self) -> bool {
        self.batch_size > 0
    }

    fn registration(self, store: &ItemStore) -> TechnologyRegistration {
        let spec = Arc::new(self);

        let auditor = {
            let spec = Arc::clone(&spec);
            let store = store.clone();
            auditor_factory(move |ctx: MonitorContext<'_>| {
                Ok(Box::new(RuleAuditor::new(&spec, &ctx.account.name, store.clone()))
                    as Box<dyn Auditor>)
            })
        };

        let registration = match spec.source_dir.clone() {
            Some(source_dir) => {
                let watcher_spec = Arc::clone(&spec);
                let store = store.clone();
                TechnologyRegistration::new(
                    spec.name.clone(),
                    watcher_factory(move |ctx: MonitorContext<'_>| {
                        Ok(Box::new(SnapshotWatcher::new(
                            &watcher_spec,
                            &source_dir,
                            &ctx.account.name,
                            store.clone(),
                        )) as Box<dyn Watcher>)
                    }),
                )
                .batch(spec.is_batch())
            }
            None => TechnologyRegistration::audit_only(spec.name.clone()),
        };

        spec.dependencies
            .iter()
            .fold(registration, |reg, dep| reg.depends_on(dep.clone()))
            .auditor(auditor)
    }
}

/// Build the technology registry from `[[technologies]]`.
///
/// # Errors
///
/// Returns a registry error when two entries share a name.
pub fn build_registry(
    config: &VigilConfig,
    store: &ItemStore,
) -> Result<TechnologyRegistry, VigilError> {
    let data_dir = Path::new(&config.general.data_dir);
    let mut registry = TechnologyRegistry::new();

    for technology in &config.technologies {
        let spec = TechnologySpec::from_config(technology, data_dir);
        tracing::info!(
            technology = %spec.name,
            batch = spec.is_batch(),
            audit_only = spec.source_dir.is_none(),
            rules = spec.rules.len(),
            "registering technology"
        );
        registry.register(spec.registration(store))?;
    }

    Ok(registry)
}
