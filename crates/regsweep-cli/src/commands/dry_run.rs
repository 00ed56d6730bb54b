//! Dry-run command implementation.
//!
//! Prints every tag the configured policy would delete, the digests that
//! would be protected, and a summary line.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use regsweep_core::{Candidate, DryRunSummary, Sweeper};
use regsweep_registry::RegistryApi;
use tracing::info;

use super::{connect, load_config};

/// Runs the dry-run command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the registry
/// is unreachable, or the candidates cannot be computed.
pub async fn execute(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    info!(host = %config.host, policy = %config.policy.policy_type, "Planning cleanup");

    let client = connect(&config).await?;
    let sweeper = Sweeper::from_config(client as Arc<dyn RegistryApi>, &config);
    let candidates = sweeper.dry_run().await.context("Failed to compute candidates")?;

    print!("{}", render_plan(&candidates));
    Ok(())
}

/// Renders the plan as printed on the console.
pub fn render_plan(candidates: &[Candidate]) -> String {
    let mut out = String::new();

    for candidate in candidates {
        for tag in &candidate.tags {
            let _ = writeln!(
                out,
                "[{}] {}:{}",
                tag.created_at.format("%Y-%m-%d %H:%M:%S"),
                candidate.full_name(),
                tag.name
            );
        }
        for (digest, tags) in &candidate.protected {
            let _ = writeln!(out, "Digest: {digest}, tags: [{}]", tags.join(" "));
        }
    }

    let summary = DryRunSummary::from_candidates(candidates);
    let _ = writeln!(
        out,
        "Total {} repos with {} images are ready for clean",
        summary.repository_count, summary.image_count
    );
    out
}
