//! The registry contract the cleanup core depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{AccessLogEntry, Project, PulledManifest, RegistryTag, Repository};

/// Registry operations used to inventory and prune tags.
///
/// Listing operations return fully flattened results: implementations walk
/// every page before returning. `repository` arguments of the manifest
/// operations are full names (`project/repo`).
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Lists all projects, optionally filtered by a name substring and by
    /// visibility (`Some(true)` public only, `Some(false)` private only).
    async fn list_all_projects(
        &self,
        name: Option<&str>,
        public: Option<bool>,
    ) -> Result<Vec<Project>>;

    /// Lists all repositories of a project.
    async fn list_all_repositories(&self, project_id: i64) -> Result<Vec<Repository>>;

    /// Lists the tags of `project/repository`, newest first.
    async fn list_tags(&self, project: &str, repository: &str) -> Result<Vec<RegistryTag>>;

    /// Deletes a single tag by name.
    async fn delete_tag(&self, project: &str, repository: &str, tag: &str) -> Result<()>;

    /// Pulls the manifest for a tag or digest, offering `accept` media types
    /// in preference order.
    async fn pull_manifest(
        &self,
        repository: &str,
        reference: &str,
        accept: &[&str],
    ) -> Result<PulledManifest>;

    /// Pushes a manifest under `tag`, returning the digest the registry
    /// assigned to it.
    async fn push_manifest(
        &self,
        repository: &str,
        tag: &str,
        media_type: &str,
        payload: &[u8],
    ) -> Result<String>;

    /// Lists access-log entries between `start` and `end`.
    async fn list_access_logs(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AccessLogEntry>>;
}
