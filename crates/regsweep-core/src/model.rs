//! Inventory, plan and result types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regsweep_registry::{MediaType, RegistryTag};
use serde::{Deserialize, Serialize};

/// A tag as seen by a single run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name, unique within its repository.
    pub name: String,

    /// Manifest digest; shared by every tag of the same image.
    pub digest: String,

    /// Image creation time.
    pub created_at: DateTime<Utc>,
}

impl Tag {
    /// Creates a tag.
    #[must_use]
    pub fn new(name: impl Into<String>, digest: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            digest: digest.into(),
            created_at,
        }
    }
}

impl From<RegistryTag> for Tag {
    fn from(tag: RegistryTag) -> Self {
        Self {
            name: tag.name,
            digest: tag.digest,
            created_at: tag.created,
        }
    }
}

/// Every tag of one repository, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTagSet {
    /// Project name.
    pub project: String,

    /// Repository name without the project prefix.
    pub repository: String,

    /// Tags ordered by creation time, newest first.
    pub tags: Vec<Tag>,
}

impl RepoTagSet {
    /// Creates a tag set, ordering `tags` newest first.
    #[must_use]
    pub fn new(project: impl Into<String>, repository: impl Into<String>, mut tags: Vec<Tag>) -> Self {
        tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self {
            project: project.into(),
            repository: repository.into(),
            tags,
        }
    }

    /// Full repository name, `project/repository`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.project, self.repository)
    }
}

/// Tags of one repository selected for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Project name.
    pub project: String,

    /// Repository name without the project prefix.
    pub repository: String,

    /// Tags to delete, newest first. Never empty.
    pub tags: Vec<Tag>,

    /// Digests of candidate tags that are also referenced by retained
    /// tags, mapped to the names of those retained tags.
    pub protected: BTreeMap<String, Vec<String>>,
}

impl Candidate {
    /// Full repository name, `project/repository`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.project, self.repository)
    }

    /// Returns true if any retained tag shares a digest with a candidate.
    #[must_use]
    pub fn needs_protection(&self) -> bool {
        !self.protected.is_empty()
    }
}

/// A manifest snapshot taken before deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedManifest {
    /// Tag names to restore the manifest under.
    pub tag_names: Vec<String>,

    /// Media type to push the manifest with.
    pub media_type: MediaType,

    /// Raw manifest bytes.
    pub payload: Vec<u8>,
}

/// Outcome of a cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Repositories that went through delete.
    pub repositories: usize,

    /// Tags successfully deleted.
    pub deleted: usize,

    /// Repositories skipped because protection failed.
    pub skipped: usize,

    /// Repositories whose protected tags could not all be restored.
    pub restore_failures: usize,

    /// The run stopped early on shutdown.
    pub interrupted: bool,
}

impl RunResult {
    /// Returns true if every repository was fully processed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.skipped == 0 && self.restore_failures == 0 && !self.interrupted
    }
}

/// Totals of a dry-run plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DryRunSummary {
    /// Repositories with at least one candidate.
    pub repository_count: usize,

    /// Candidate tags across all repositories.
    pub image_count: usize,
}

impl DryRunSummary {
    /// Summarizes a candidate list.
    #[must_use]
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        Self {
            repository_count: candidates.len(),
            image_count: candidates.iter().map(|c| c.tags.len()).sum(),
        }
    }
}
