//! CLI commands and argument parsing.

pub mod clean;
pub mod dry_run;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regsweep_core::{SweepConfig, DEFAULT_CONFIG_PATH};
use regsweep_registry::HarborClient;

/// Regsweep - prunes old container image tags without losing shared images
#[derive(Parser)]
#[command(name = "regsweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "REGSWEEP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Delete tags selected by the retention policy
    Clean(clean::CleanArgs),

    /// Print the tags the retention policy would delete
    DryRun,

    /// Print version information
    Version,
}

/// Loads the configuration file.
pub fn load_config(path: &Path) -> Result<SweepConfig> {
    SweepConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Connects to the configured registry.
pub async fn connect(config: &SweepConfig) -> Result<Arc<HarborClient>> {
    let client = HarborClient::connect(config.registry_config())
        .await
        .with_context(|| format!("Failed to connect to registry {}", config.host))?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dry_run_with_config() {
        let cli = Cli::parse_from(["regsweep", "--config", "/tmp/c.yaml", "dry-run"]);
        assert_eq!(cli.config, PathBuf::from("/tmp/c.yaml"));
        assert!(matches!(cli.command, Commands::DryRun));
    }

    #[test]
    fn test_parse_clean_once() {
        let cli = Cli::parse_from(["regsweep", "clean", "--once"]);
        match cli.command {
            Commands::Clean(args) => assert!(args.once),
            _ => panic!("expected clean"),
        }
    }
}
