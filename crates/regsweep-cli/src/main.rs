//! Regsweep CLI - prunes old container image tags from a registry.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod shutdown;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regsweep=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Clean(args) => commands::clean::execute(&cli.config, &args).await,
        Commands::DryRun => commands::dry_run::execute(&cli.config).await,
        Commands::Version => {
            println!("regsweep {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
