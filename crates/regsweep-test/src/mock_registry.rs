//! In-memory registry.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regsweep_registry::{
    compute_digest, split_repository, AccessLogEntry, MediaType, Project, PulledManifest,
    RegistryApi, RegistryError, RegistryTag, Repository, Result,
};

use crate::fixtures;

/// How `delete_tag` treats other tags sharing the deleted tag's digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteSemantics {
    /// Deleting a tag deletes its manifest, and with it every tag that
    /// points at the same digest.
    #[default]
    Cascade,

    /// Deleting a tag removes only that tag.
    TagOnly,
}

/// A call received by [`MockRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    /// `list_all_projects`.
    ListProjects,
    /// `list_all_repositories`.
    ListRepositories {
        /// Project identifier.
        project_id: i64,
    },
    /// `list_tags`.
    ListTags {
        /// Full repository name.
        repository: String,
    },
    /// `delete_tag`.
    DeleteTag {
        /// Full repository name.
        repository: String,
        /// Tag name.
        tag: String,
    },
    /// `pull_manifest`.
    PullManifest {
        /// Full repository name.
        repository: String,
        /// Tag or digest.
        reference: String,
    },
    /// `push_manifest`.
    PushManifest {
        /// Full repository name.
        repository: String,
        /// Tag name.
        tag: String,
    },
    /// `list_access_logs`.
    ListAccessLogs,
}

impl RegistryCall {
    /// Returns true for calls that change registry state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::DeleteTag { .. } | Self::PushManifest { .. })
    }
}

#[derive(Debug, Clone)]
struct StoredTag {
    name: String,
    digest: String,
    created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredManifest {
    media_type: String,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    projects: Vec<Project>,
    repositories: BTreeMap<String, Vec<StoredTag>>,
    manifests: HashMap<String, StoredManifest>,
    access_logs: Vec<AccessLogEntry>,
}

#[derive(Debug, Default)]
struct Failures {
    list_projects: bool,
    list_tags: HashSet<String>,
    access_logs: bool,
    pull: HashSet<String>,
    converted: HashSet<String>,
    delete: HashSet<String>,
    push: HashSet<String>,
}

/// In-memory [`RegistryApi`] implementation.
#[derive(Debug, Default)]
pub struct MockRegistry {
    semantics: DeleteSemantics,
    state: Mutex<State>,
    failures: Mutex<Failures>,
    calls: Mutex<Vec<RegistryCall>>,
}

impl MockRegistry {
    /// Creates an empty registry with cascading deletes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delete-by-tag semantics.
    #[must_use]
    pub const fn with_delete_semantics(mut self, semantics: DeleteSemantics) -> Self {
        self.semantics = semantics;
        self
    }

    /// Adds a project if it does not exist yet, returning its identifier.
    pub fn add_project(&self, name: &str) -> i64 {
        let mut state = self.state.lock();
        if let Some(project) = state.projects.iter().find(|p| p.name == name) {
            return project.id;
        }
        let id = i64::try_from(state.projects.len()).unwrap_or(i64::MAX) + 1;
        state.projects.push(Project::new(id, name));
        id
    }

    /// Stores a manifest built from `seed` and tags it in `repository`
    /// (`project/repo`), returning the manifest digest.
    pub fn add_image(
        &self,
        repository: &str,
        tag: &str,
        seed: &str,
        created: DateTime<Utc>,
    ) -> String {
        let payload = fixtures::manifest_payload(seed);
        let digest = compute_digest(&payload);
        self.state.lock().manifests.insert(
            digest.clone(),
            StoredManifest {
                media_type: MediaType::DOCKER_SCHEMA2.to_string(),
                payload,
            },
        );
        self.tag_image(repository, tag, &digest, created);
        digest
    }

    /// Points `tag` in `repository` at an existing digest.
    pub fn tag_image(&self, repository: &str, tag: &str, digest: &str, created: DateTime<Utc>) {
        let (project, _) = split_repository(repository);
        self.add_project(project);

        let mut state = self.state.lock();
        let tags = state.repositories.entry(repository.to_string()).or_default();
        tags.retain(|t| t.name != tag);
        tags.push(StoredTag {
            name: tag.to_string(),
            digest: digest.to_string(),
            created,
        });
    }

    /// Records an access-log entry for `repository:tag`.
    pub fn record_access(&self, repository: &str, tag: &str, at: DateTime<Utc>) {
        self.state.lock().access_logs.push(AccessLogEntry {
            repo_name: repository.to_string(),
            tag: tag.to_string(),
            operation: "pull".to_string(),
            op_time: at,
        });
    }

    /// Makes project listing fail.
    pub fn fail_list_projects(&self) {
        self.failures.lock().list_projects = true;
    }

    /// Makes tag listing of `repository` fail.
    pub fn fail_list_tags(&self, repository: &str) {
        self.failures.lock().list_tags.insert(repository.to_string());
    }

    /// Makes access-log listing fail.
    pub fn fail_access_logs(&self) {
        self.failures.lock().access_logs = true;
    }

    /// Makes pulling `digest` fail.
    pub fn fail_pull(&self, digest: &str) {
        self.failures.lock().pull.insert(digest.to_string());
    }

    /// Makes pulling `digest` return a converted manifest with different
    /// content, as registries do when they down-convert formats.
    pub fn convert_on_pull(&self, digest: &str) {
        self.failures.lock().converted.insert(digest.to_string());
    }

    /// Makes deleting `tag` fail in every repository.
    pub fn fail_delete(&self, tag: &str) {
        self.failures.lock().delete.insert(tag.to_string());
    }

    /// Makes pushing `tag` fail in every repository.
    pub fn fail_push(&self, tag: &str) {
        self.failures.lock().push.insert(tag.to_string());
    }

    /// Tag names of `repository`, newest first.
    #[must_use]
    pub fn tags(&self, repository: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .repositories
            .get(repository)
            .map(|tags| sorted(tags).into_iter().map(|t| t.name).collect())
            .unwrap_or_default()
    }

    /// Digest `tag` currently points at in `repository`.
    #[must_use]
    pub fn digest_of(&self, repository: &str, tag: &str) -> Option<String> {
        let state = self.state.lock();
        state
            .repositories
            .get(repository)?
            .iter()
            .find(|t| t.name == tag)
            .map(|t| t.digest.clone())
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().clone()
    }

    /// Calls that changed registry state.
    #[must_use]
    pub fn mutations(&self) -> Vec<RegistryCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: RegistryCall) {
        self.calls.lock().push(call);
    }
}

fn sorted(tags: &[StoredTag]) -> Vec<StoredTag> {
    let mut tags = tags.to_vec();
    tags.sort_by(|a, b| b.created.cmp(&a.created));
    tags
}

fn injected(operation: &str, target: &str) -> RegistryError {
    RegistryError::HttpError {
        status: 500,
        message: format!("injected {operation} failure for {target}"),
    }
}

#[async_trait]
impl RegistryApi for MockRegistry {
    async fn list_all_projects(
        &self,
        name: Option<&str>,
        _public: Option<bool>,
    ) -> Result<Vec<Project>> {
        self.record(RegistryCall::ListProjects);
        if self.failures.lock().list_projects {
            return Err(injected("list projects", "registry"));
        }

        let state = self.state.lock();
        Ok(state
            .projects
            .iter()
            .filter(|p| name.map_or(true, |n| p.name.contains(n)))
            .cloned()
            .collect())
    }

    async fn list_all_repositories(&self, project_id: i64) -> Result<Vec<Repository>> {
        self.record(RegistryCall::ListRepositories { project_id });

        let state = self.state.lock();
        let project = state
            .projects
            .iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| RegistryError::NotFound {
                resource: format!("project {project_id}"),
            })?;

        Ok(state
            .repositories
            .iter()
            .filter(|(name, _)| split_repository(name).0 == project.name)
            .map(|(name, tags)| Repository {
                name: name.clone(),
                project_id,
                tags_count: i64::try_from(tags.len()).unwrap_or(i64::MAX),
            })
            .collect())
    }

    async fn list_tags(&self, project: &str, repository: &str) -> Result<Vec<RegistryTag>> {
        let full = format!("{project}/{repository}");
        self.record(RegistryCall::ListTags {
            repository: full.clone(),
        });
        if self.failures.lock().list_tags.contains(&full) {
            return Err(injected("list tags", &full));
        }

        let state = self.state.lock();
        let tags = state
            .repositories
            .get(&full)
            .ok_or_else(|| RegistryError::NotFound {
                resource: format!("repository {full}"),
            })?;

        Ok(sorted(tags)
            .into_iter()
            .map(|t| RegistryTag {
                name: t.name,
                digest: t.digest,
                created: t.created,
                size: 0,
            })
            .collect())
    }

    async fn delete_tag(&self, project: &str, repository: &str, tag: &str) -> Result<()> {
        let full = format!("{project}/{repository}");
        self.record(RegistryCall::DeleteTag {
            repository: full.clone(),
            tag: tag.to_string(),
        });
        if self.failures.lock().delete.contains(tag) {
            return Err(injected("delete", tag));
        }

        let mut state = self.state.lock();
        let tags = state
            .repositories
            .get_mut(&full)
            .ok_or_else(|| RegistryError::NotFound {
                resource: format!("repository {full}"),
            })?;
        let digest = tags
            .iter()
            .find(|t| t.name == tag)
            .map(|t| t.digest.clone())
            .ok_or_else(|| RegistryError::NotFound {
                resource: format!("tag {full}:{tag}"),
            })?;

        match self.semantics {
            DeleteSemantics::Cascade => tags.retain(|t| t.digest != digest),
            DeleteSemantics::TagOnly => tags.retain(|t| t.name != tag),
        }
        Ok(())
    }

    async fn pull_manifest(
        &self,
        repository: &str,
        reference: &str,
        _accept: &[&str],
    ) -> Result<PulledManifest> {
        self.record(RegistryCall::PullManifest {
            repository: repository.to_string(),
            reference: reference.to_string(),
        });

        let digest = if reference.starts_with("sha256:") {
            reference.to_string()
        } else {
            self.digest_of(repository, reference)
                .ok_or_else(|| RegistryError::NotFound {
                    resource: format!("manifest {repository}@{reference}"),
                })?
        };

        let failures = self.failures.lock();
        if failures.pull.contains(&digest) {
            return Err(RegistryError::ManifestPullFailed {
                repository: repository.to_string(),
                reference: reference.to_string(),
                message: "injected pull failure".to_string(),
            });
        }
        let converted = failures.converted.contains(&digest);
        drop(failures);

        let state = self.state.lock();
        let manifest = state
            .manifests
            .get(&digest)
            .ok_or_else(|| RegistryError::NotFound {
                resource: format!("manifest {repository}@{reference}"),
            })?;

        if converted {
            let payload = fixtures::manifest_payload(&format!("converted-{digest}"));
            return Ok(PulledManifest {
                digest: digest.clone(),
                media_type: MediaType::new(MediaType::DOCKER_SCHEMA2),
                payload,
            });
        }

        Ok(PulledManifest {
            digest: digest.clone(),
            media_type: MediaType::new(manifest.media_type.as_str()),
            payload: manifest.payload.clone(),
        })
    }

    async fn push_manifest(
        &self,
        repository: &str,
        tag: &str,
        media_type: &str,
        payload: &[u8],
    ) -> Result<String> {
        self.record(RegistryCall::PushManifest {
            repository: repository.to_string(),
            tag: tag.to_string(),
        });
        if self.failures.lock().push.contains(tag) {
            return Err(RegistryError::ManifestPushFailed {
                repository: repository.to_string(),
                tag: tag.to_string(),
                message: "injected push failure".to_string(),
            });
        }

        let digest = compute_digest(payload);
        self.state.lock().manifests.insert(
            digest.clone(),
            StoredManifest {
                media_type: media_type.to_string(),
                payload: payload.to_vec(),
            },
        );
        self.tag_image(repository, tag, &digest, Utc::now());
        Ok(digest)
    }

    async fn list_access_logs(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AccessLogEntry>> {
        self.record(RegistryCall::ListAccessLogs);
        if self.failures.lock().access_logs {
            return Err(injected("list access logs", "registry"));
        }

        let state = self.state.lock();
        Ok(state
            .access_logs
            .iter()
            .filter(|e| e.op_time >= start && e.op_time <= end)
            .cloned()
            .collect())
    }
}
