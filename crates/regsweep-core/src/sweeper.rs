//! Run orchestration.
//!
//! A [`Sweeper`] plans a run (policy, inventory, candidates) and either
//! reports the plan ([`Sweeper::dry_run`]) or executes it repository by
//! repository ([`Sweeper::clean`]).

use std::sync::Arc;

use regsweep_registry::RegistryApi;
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::cleaner::RepositoryCleaner;
use crate::config::{PolicyConfig, SweepConfig};
use crate::error::Result;
use crate::inventory::collect_inventory;
use crate::model::{Candidate, RunResult};
use crate::policy::build_policy;

/// Plans and runs tag cleanups against one registry.
#[derive(Clone)]
pub struct Sweeper {
    registry: Arc<dyn RegistryApi>,
    projects: Vec<String>,
    policy: PolicyConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("projects", &self.projects)
            .field("policy", &self.policy.policy_type)
            .finish_non_exhaustive()
    }
}

impl Sweeper {
    /// Creates a sweeper for `projects` (empty means all) under `policy`.
    #[must_use]
    pub fn new(registry: Arc<dyn RegistryApi>, projects: Vec<String>, policy: PolicyConfig) -> Self {
        Self {
            registry,
            projects,
            policy,
            shutdown: None,
        }
    }

    /// Creates a sweeper from a loaded configuration.
    #[must_use]
    pub fn from_config(registry: Arc<dyn RegistryApi>, config: &SweepConfig) -> Self {
        Self::new(registry, config.projects.clone(), config.policy.clone())
    }

    /// Stops [`clean`](Self::clean) between repositories once `shutdown`
    /// reads true.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Computes the candidates without touching the registry's contents.
    pub async fn dry_run(&self) -> Result<Vec<Candidate>> {
        let span = tracing::info_span!("sweep", run_id = %Uuid::now_v7(), mode = "dry-run");
        self.plan().instrument(span).await
    }

    /// Computes the candidates and cleans every repository.
    ///
    /// Errors while planning abort the run. Failures inside a repository
    /// are counted in the [`RunResult`] and do not affect the others.
    pub async fn clean(&self) -> Result<RunResult> {
        let span = tracing::info_span!("sweep", run_id = %Uuid::now_v7(), mode = "clean");
        self.execute().instrument(span).await
    }

    async fn plan(&self) -> Result<Vec<Candidate>> {
        let policy = build_policy(&self.policy, Arc::clone(&self.registry))?;
        let inventory = collect_inventory(self.registry.as_ref(), &self.projects).await?;
        let candidates = policy.list_candidates(&inventory).await?;

        tracing::info!(
            policy = %policy.policy_type(),
            repositories = candidates.len(),
            tags = candidates.iter().map(|c| c.tags.len()).sum::<usize>(),
            "Candidates computed"
        );
        Ok(candidates)
    }

    async fn execute(&self) -> Result<RunResult> {
        let candidates = self.plan().await?;
        let mut result = RunResult::default();

        tracing::info!(repositories = candidates.len(), "Starting cleanup");
        for candidate in &candidates {
            if self.shutdown_requested() {
                tracing::warn!("Shutdown requested, stopping before next repository");
                result.interrupted = true;
                break;
            }

            let mut cleaner = RepositoryCleaner::new(self.registry.as_ref(), candidate);
            if let Err(e) = cleaner.protect().await {
                tracing::error!(
                    repository = %cleaner.repository(),
                    error = %e,
                    "Failed to protect shared digests, skipping repository"
                );
                result.skipped += 1;
                continue;
            }

            result.repositories += 1;
            result.deleted += cleaner.delete().await;

            if let Err(e) = cleaner.restore().await {
                tracing::error!(
                    repository = %cleaner.repository(),
                    error = %e,
                    "Failed to restore protected tags, repository needs manual reconciliation"
                );
                result.restore_failures += 1;
            }
        }

        tracing::info!(
            repositories = result.repositories,
            deleted = result.deleted,
            skipped = result.skipped,
            restore_failures = result.restore_failures,
            "Cleanup finished"
        );
        Ok(result)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}
