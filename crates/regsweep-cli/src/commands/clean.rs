//! Clean command implementation.
//!
//! Runs the cleanup once, or on the configured cron schedule until a
//! shutdown signal arrives.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use regsweep_core::{CronScheduler, RunResult, Sweeper};
use regsweep_registry::RegistryApi;
use tracing::{error, info};

use super::{connect, load_config};
use crate::shutdown;

/// Arguments for the clean command.
#[derive(Args)]
pub struct CleanArgs {
    /// Run once even if a cron trigger is configured
    #[arg(long)]
    pub once: bool,
}

/// Runs the clean command.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration cannot be loaded
/// - The registry login fails
/// - A run-once cleanup fails or leaves tags unrestored
pub async fn execute(config_path: &Path, args: &CleanArgs) -> Result<()> {
    let config = load_config(config_path)?;
    let shutdown = shutdown::install();

    let client = connect(&config).await?;
    let refresh = client.spawn_refresh_loop(shutdown.clone());

    let sweeper = Sweeper::from_config(Arc::clone(&client) as Arc<dyn RegistryApi>, &config)
        .with_shutdown(shutdown.clone());

    let outcome = match config.cron_expression().filter(|_| !args.once) {
        Some(expr) => {
            let scheduler = CronScheduler::new(expr, move || {
                let sweeper = sweeper.clone();
                async move {
                    match sweeper.clean().await {
                        Ok(result) => report(&result),
                        Err(e) => error!(error = %e, "Scheduled cleanup failed"),
                    }
                }
            })
            .context("Invalid cron trigger")?;

            if let Some(next) = scheduler.next_tick() {
                info!(cron = %scheduler.expression(), next = %next, "Waiting for cron trigger");
            }
            scheduler.run(shutdown).await;
            Ok(())
        }
        None => run_once(&sweeper).await,
    };

    refresh.abort();
    outcome
}

async fn run_once(sweeper: &Sweeper) -> Result<()> {
    let result = sweeper.clean().await.context("Cleanup failed")?;
    report(&result);

    if result.restore_failures > 0 {
        anyhow::bail!(
            "{} repositories could not restore protected tags and need manual reconciliation",
            result.restore_failures
        );
    }
    Ok(())
}

fn report(result: &RunResult) {
    println!(
        "Totally {} images cleaned in {} repos",
        result.deleted, result.repositories
    );
    if result.skipped > 0 {
        println!(
            "{} repos skipped because shared digests could not be protected",
            result.skipped
        );
    }
    if result.restore_failures > 0 {
        println!(
            "{} repos failed to restore protected tags",
            result.restore_failures
        );
    }
    if result.interrupted {
        println!("Cleanup interrupted by shutdown");
    }
}
