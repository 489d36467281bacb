//! CLI argument definitions for vigil-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.
//! Without a subcommand the daemon runs the scheduler.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Vigil cloud account watch and audit daemon.
///
/// Schedules watchers and auditors for every active first-party account and
/// exposes the manual change finder, change reporter, and audit runs.
#[derive(Parser, Debug)]
#[command(name = "vigil-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to vigil.toml configuration file.
    #[arg(short, long, global = true, default_value = "/etc/vigil/vigil.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl DaemonCli {
    /// The selected subcommand, defaulting to [`Command::Run`].
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bootstrap the scheduler and run until SIGINT/SIGTERM (default).
    Run,

    /// Watch and audit the given accounts and technologies once.
    FindChanges(TargetArgs),

    /// Watch every technology of the given accounts once and send alerts.
    Report(AccountArgs),

    /// Audit the given accounts and technologies once.
    Audit(AuditArgs),

    /// Validate the configuration file and exit.
    Validate,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AccountArgs {
    /// Account names (repeatable or comma-separated).
    #[arg(short, long = "account", required = true, value_delimiter = ',')]
    pub accounts: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct TargetArgs {
    /// Account names (repeatable or comma-separated).
    #[arg(short, long = "account", required = true, value_delimiter = ',')]
    pub accounts: Vec<String>,

    /// Technology identifiers (repeatable or comma-separated).
    #[arg(short, long = "technology", required = true, value_delimiter = ',')]
    pub technologies: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AuditArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Render and deliver auditor reports.
    #[arg(long)]
    pub send_report: bool,
}
