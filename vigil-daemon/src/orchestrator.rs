//! Engine assembly and scheduler lifecycle.
//!
//! The [`Orchestrator`] is the central coordinator of `vigil-daemon`.
//! It loads configuration, registers the configured technologies, wires the
//! scheduling engine to its collaborators, and drives the in-process task
//! queue until a shutdown signal arrives.
//!
//! # Startup Order
//!
//! 1. Technology registry (one watcher/auditor factory per `[[technologies]]`)
//! 2. Monitor provider over `[[accounts]]`
//! 3. Engine (exception store, alerter, optional issue sync)
//! 4. Local task queue and bootstrap pass
//!
//! # Shutdown
//!
//! Pending registrations are purged and in-flight tasks run to completion.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use vigil_core::config::VigilConfig;
use vigil_core::provider::{MonitorProvider, StaticMonitorProvider};
use vigil_core::store::{MemoryStore, Persistence};
use vigil_scheduler::{BootstrapSummary, Engine, LocalTaskQueue};

use crate::metrics_server;
use crate::notify::{LogAlerter, LogIssueSync};
use crate::technologies::{self, ItemStore};

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: VigilConfig,
    /// Scheduling engine.
    engine: Engine,
    /// Items and issues shared by all technologies.
    items: ItemStore,
    /// Exception records and session bookkeeping.
    exceptions: Arc<MemoryStore>,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// This performs the following steps:
    /// 1. Load `vigil.toml` and apply environment variable overrides
    /// 2. Validate the configuration
    /// 3. Register technologies and assemble the engine
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - Two technologies share a name
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = VigilConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// Useful for testing or when config has already been loaded.
    pub fn build_from_config(config: VigilConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let items = ItemStore::new();
        let registry = technologies::build_registry(&config, &items)
            .map_err(|e| anyhow::anyhow!("failed to build technology registry: {}", e))?;
        tracing::info!(
            technologies = registry.len(),
            accounts = config.accounts.len(),
            "technology registry initialized"
        );

        let provider: Arc<dyn MonitorProvider> = Arc::new(StaticMonitorProvider::new(
            config.accounts.clone(),
            Arc::new(registry),
        ));
        let exceptions = Arc::new(MemoryStore::new());

        let mut builder = Engine::builder()
            .config(config.scheduler.clone())
            .debug(config.general.debug)
            .provider(provider)
            .persistence(Arc::clone(&exceptions) as Arc<dyn Persistence>)
            .alerter(Arc::new(LogAlerter::new(items.clone())));
        if config.issue_sync.enabled {
            tracing::info!("issue tracker sync enabled");
            builder = builder.issue_sync(Arc::new(LogIssueSync::new(items.clone())));
        }
        let engine = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build engine: {}", e))?;

        Ok(Self {
            config,
            engine,
            items,
            exceptions,
        })
    }

    /// Create the local task queue and run the first bootstrap pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be created, the schedule
    /// expressions are invalid, or the bootstrap pass fails (the failure
    /// is also recorded as an exception).
    pub async fn start(&self) -> Result<(Arc<LocalTaskQueue>, BootstrapSummary)> {
        let queue = Arc::new(
            LocalTaskQueue::new(
                self.engine.task_handler(),
                self.config.scheduler.worker_concurrency,
            )
            .map_err(|e| anyhow::anyhow!("failed to create task queue: {}", e))?,
        );

        let bootstrapper = self
            .engine
            .bootstrapper(queue.clone())
            .map_err(|e| anyhow::anyhow!("failed to create bootstrapper: {}", e))?;
        let Some(summary) = bootstrapper.bootstrap().await else {
            queue.shutdown().await;
            return Err(anyhow::anyhow!(
                "scheduler bootstrap failed, see recorded exceptions"
            ));
        };

        tracing::info!(
            accounts = summary.accounts,
            immediate = summary.immediate,
            periodic = summary.periodic,
            audit_only = summary.audit_only,
            "scheduler bootstrapped"
        );
        Ok((queue, summary))
    }

    /// Bootstrap the scheduler and run until a shutdown signal is received.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&self) -> Result<()> {
        if self.config.metrics.enabled {
            metrics_server::install_metrics_recorder(&self.config.metrics)?;
        }

        let (queue, _summary) = self.start().await?;

        tracing::info!("entering main loop");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        queue.shutdown().await;
        tracing::info!(
            exceptions = self.exceptions.records().len(),
            "vigil-daemon shut down"
        );
        Ok(())
    }

    /// The assembled engine, for the manual entry points.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &VigilConfig {
        &self.config
    }

    /// Items and issues collected so far.
    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    /// Exception records captured so far.
    pub fn exceptions(&self) -> &MemoryStore {
        &self.exceptions
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
