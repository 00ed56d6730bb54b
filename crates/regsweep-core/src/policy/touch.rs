use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regsweep_registry::{AccessLogEntry, RegistryApi};

use super::{PolicyType, RetentionPolicy};
use crate::error::{Result, SweepError};
use crate::model::{Candidate, RepoTagSet, Tag};
use crate::protection;
use crate::retain::RetainPatterns;

/// Deletes tags that nobody accessed within the inactivity window.
///
/// Access is read from the registry's access log, so the result is only
/// as good as the log's retention: a registry that prunes its log sooner
/// than the window makes active tags look stale.
pub struct TouchPolicy {
    registry: Arc<dyn RegistryApi>,
    window: Duration,
    retain: RetainPatterns,
}

impl std::fmt::Debug for TouchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TouchPolicy")
            .field("window", &self.window)
            .field("retain", &self.retain)
            .finish_non_exhaustive()
    }
}

impl TouchPolicy {
    /// Creates the policy.
    #[must_use]
    pub fn new(registry: Arc<dyn RegistryApi>, window: Duration, retain: RetainPatterns) -> Self {
        Self {
            registry,
            window,
            retain,
        }
    }

    /// Selects candidates given the set of touched `project/repo:tag` keys.
    #[must_use]
    pub fn select(&self, inventory: &[RepoTagSet], touched: &HashSet<String>) -> Vec<Candidate> {
        inventory
            .iter()
            .filter_map(|set| {
                let full = set.full_name();
                let (retained, candidates): (Vec<Tag>, Vec<Tag>) =
                    set.tags.iter().cloned().partition(|t| {
                        touched.contains(&touch_key(&full, &t.name)) || self.retain.retains(&t.name)
                    });
                protection::resolve(set, candidates, &retained)
            })
            .collect()
    }

    async fn touched_since(&self, now: DateTime<Utc>) -> Result<HashSet<String>> {
        let window = chrono::Duration::from_std(self.window).map_err(|_| {
            SweepError::config(format!(
                "policy.notTouchedPolicy.time is too large: {}s",
                self.window.as_secs()
            ))
        })?;
        let start = now - window;

        let entries = self
            .registry
            .list_access_logs(start, now)
            .await
            .map_err(|e| SweepError::registry("list access logs", e))?;

        warn_on_log_depth(start, &entries);

        Ok(entries
            .iter()
            .map(|e| touch_key(&e.repo_name, &e.tag))
            .collect())
    }
}

fn touch_key(repository: &str, tag: &str) -> String {
    format!("{repository}:{tag}")
}

fn warn_on_log_depth(start: DateTime<Utc>, entries: &[AccessLogEntry]) {
    let earliest = entries.iter().map(|e| e.op_time).min();
    match earliest {
        Some(earliest) => tracing::warn!(
            window_start = %start,
            earliest_entry = %earliest,
            entries = entries.len(),
            "Access log is trusted to cover the whole inactivity window; tags accessed before the log's retention horizon are treated as untouched"
        ),
        None => tracing::warn!(
            window_start = %start,
            "Access log returned no entries for the inactivity window; every unretained tag is treated as untouched"
        ),
    }
}

#[async_trait]
impl RetentionPolicy for TouchPolicy {
    fn policy_type(&self) -> PolicyType {
        PolicyType::RecentlyNotTouched
    }

    async fn list_candidates(&self, inventory: &[RepoTagSet]) -> Result<Vec<Candidate>> {
        let touched = self.touched_since(Utc::now()).await?;
        tracing::debug!(touched = touched.len(), "Collected recently touched tags");
        Ok(self.select(inventory, &touched))
    }
}
