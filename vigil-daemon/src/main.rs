use anyhow::Result;
use clap::Parser;

use vigil_core::config::VigilConfig;
use vigil_daemon::cli::{Command, DaemonCli};
use vigil_daemon::logging;
use vigil_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // Config precedence: CLI > env > file > defaults
    let mut config = VigilConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    let command = cli.command();
    if command == Command::Validate {
        println!(
            "configuration OK: {} account(s), {} technolog(ies)",
            config.accounts.len(),
            config.technologies.len()
        );
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "vigil-daemon starting"
    );

    let orchestrator = Orchestrator::build_from_config(config)?;
    let engine = orchestrator.engine();

    match command {
        Command::Run => orchestrator.run().await?,
        Command::FindChanges(target) => {
            let summary = engine
                .run_change_finder(&target.accounts, &target.technologies)
                .await?;
            tracing::info!(
                accounts = summary.accounts,
                processed = ?summary.processed,
                "find-changes completed"
            );
        }
        Command::Report(args) => {
            let summary = engine.run_change_reporter(&args.accounts).await?;
            tracing::info!(
                accounts = summary.accounts,
                processed = ?summary.processed,
                "report completed"
            );
        }
        Command::Audit(args) => {
            engine
                .run_audit(
                    &args.target.accounts,
                    &args.target.technologies,
                    args.send_report,
                )
                .await?;
            tracing::info!(send_report = args.send_report, "audit completed");
        }
        Command::Validate => {}
    }

    Ok(())
}
