//! Manifest media types and content digests.
//!
//! Types in this module follow the Docker Registry HTTP API v2 and the OCI
//! Distribution Specification closely enough to pull a manifest and push it
//! back byte-for-byte.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Manifest media type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(String);

impl MediaType {
    /// Docker image manifest, schema 1 (signed).
    pub const DOCKER_SCHEMA1_SIGNED: &'static str =
        "application/vnd.docker.distribution.manifest.v1+prettyjws";

    /// Docker image manifest, schema 2.
    pub const DOCKER_SCHEMA2: &'static str = "application/vnd.docker.distribution.manifest.v2+json";

    /// Docker manifest list (multi-platform).
    pub const DOCKER_MANIFEST_LIST: &'static str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// OCI image manifest media type.
    pub const OCI_MANIFEST: &'static str = "application/vnd.oci.image.manifest.v1+json";

    /// OCI image index media type.
    pub const OCI_INDEX: &'static str = "application/vnd.oci.image.index.v1+json";

    /// Media types requested when pulling a manifest, most preferred first.
    ///
    /// Index types come first so a registry never down-converts a
    /// multi-platform image into a single-platform manifest.
    pub const ACCEPTED: [&'static str; 5] = [
        Self::DOCKER_MANIFEST_LIST,
        Self::OCI_INDEX,
        Self::DOCKER_SCHEMA2,
        Self::OCI_MANIFEST,
        Self::DOCKER_SCHEMA1_SIGNED,
    ];

    /// Creates a new media type.
    #[must_use]
    pub fn new(media_type: impl Into<String>) -> Self {
        Self(media_type.into())
    }

    /// Normalizes a `Content-Type` returned by a registry.
    ///
    /// Old registries serve schema 1 manifests as plain `application/json`;
    /// pushing them back requires the signed schema 1 type. Parameters such
    /// as `; charset=utf-8` are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use regsweep_registry::MediaType;
    ///
    /// let mt = MediaType::normalize("application/json; charset=utf-8");
    /// assert_eq!(mt.as_str(), MediaType::DOCKER_SCHEMA1_SIGNED);
    /// ```
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        if raw.contains("application/json") {
            return Self::new(Self::DOCKER_SCHEMA1_SIGNED);
        }
        let essence = raw.split(';').next().unwrap_or(raw).trim();
        Self::new(essence)
    }

    /// Returns the media type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for schema 1 manifests, whose digest is computed over
    /// the payload with its signatures stripped.
    #[must_use]
    pub fn is_schema1(&self) -> bool {
        self.0.starts_with("application/vnd.docker.distribution.manifest.v1")
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Computes the `sha256:<hex>` content digest of a payload.
///
/// # Examples
///
/// ```
/// use regsweep_registry::compute_digest;
///
/// let digest = compute_digest(b"{}");
/// assert!(digest.starts_with("sha256:"));
/// assert_eq!(digest.len(), 7 + 64);
/// ```
#[must_use]
pub fn compute_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Error response from the registry v2 API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// List of errors.
    pub errors: Vec<RegistryApiError>,
}

impl ErrorResponse {
    /// Renders the errors as a single line, falling back to the raw body.
    pub fn describe(body: &str) -> String {
        serde_json::from_str::<Self>(body).map_or_else(
            |_| body.trim().to_string(),
            |parsed| {
                parsed
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .collect::<Vec<_>>()
                    .join("; ")
            },
        )
    }
}

/// Individual error from the registry v2 API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryApiError {
    /// Error code.
    pub code: String,

    /// Human-readable message.
    pub message: String,

    /// Additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}
