//! Wire types returned by the registry API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::oci::MediaType;

/// A project (namespace) in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Numeric project identifier.
    #[serde(rename = "project_id")]
    pub id: i64,

    /// Project name.
    pub name: String,
}

impl Project {
    /// Creates a project record.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A repository inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Full repository name, `project/repo`.
    pub name: String,

    /// Owning project identifier.
    #[serde(default)]
    pub project_id: i64,

    /// Number of tags, as reported by the registry.
    #[serde(default)]
    pub tags_count: i64,
}

/// Splits a full repository name at its first `/` into `(project, repo)`.
///
/// A name without a slash has an empty project component.
///
/// # Examples
///
/// ```
/// use regsweep_registry::split_repository;
///
/// assert_eq!(split_repository("library/nginx"), ("library", "nginx"));
/// assert_eq!(split_repository("team/tools/builder"), ("team", "tools/builder"));
/// assert_eq!(split_repository("busybox"), ("", "busybox"));
/// ```
#[must_use]
pub fn split_repository(name: &str) -> (&str, &str) {
    let name = name.trim_matches('/');
    name.split_once('/').unwrap_or(("", name))
}

/// A tag as listed by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryTag {
    /// Tag name.
    pub name: String,

    /// Manifest digest the tag points at.
    pub digest: String,

    /// Image creation time.
    pub created: DateTime<Utc>,

    /// Image size in bytes, when reported.
    #[serde(default)]
    pub size: i64,
}

/// One entry of the registry access log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// Full repository name, `project/repo`.
    pub repo_name: String,

    /// Tag that was accessed.
    #[serde(rename = "repo_tag")]
    pub tag: String,

    /// Operation (`pull`, `push`, `create`, `delete`).
    #[serde(default)]
    pub operation: String,

    /// When the operation happened.
    pub op_time: DateTime<Utc>,
}

/// A manifest pulled from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulledManifest {
    /// Digest reported by the registry (`Docker-Content-Digest`).
    pub digest: String,

    /// Normalized media type of the payload.
    pub media_type: MediaType,

    /// Raw manifest bytes.
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_deserialization() {
        let json = r#"{"project_id": 3, "name": "library", "repo_count": 12}"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project, Project::new(3, "library"));
    }

    #[test]
    fn test_split_repository_trims_slashes() {
        assert_eq!(split_repository("/library/nginx/"), ("library", "nginx"));
    }

    #[test]
    fn test_tag_deserialization() {
        let json = r#"{
            "digest": "sha256:abc",
            "name": "v1.0",
            "size": 1024,
            "architecture": "amd64",
            "created": "2024-03-01T10:00:00Z"
        }"#;
        let tag: RegistryTag = serde_json::from_str(json).unwrap();
        assert_eq!(tag.name, "v1.0");
        assert_eq!(tag.digest, "sha256:abc");
        assert_eq!(tag.size, 1024);
    }

    #[test]
    fn test_access_log_deserialization() {
        let json = r#"{
            "log_id": 7,
            "repo_name": "library/nginx",
            "repo_tag": "1.25",
            "operation": "pull",
            "op_time": "2024-03-01T10:00:00Z"
        }"#;
        let entry: AccessLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.repo_name, "library/nginx");
        assert_eq!(entry.tag, "1.25");
        assert_eq!(entry.operation, "pull");
    }
}
