//! Protect, delete and restore for a single repository.
//!
//! ```text
//!   protect ──(any pull fails)──▶ skip repository
//!      │
//!      ▼
//!   delete (best effort, every candidate tag)
//!      │
//!      ▼
//!   restore ──(any push fails)──▶ repository needs manual reconciliation
//! ```
//!
//! Registries that implement delete-by-tag as delete-by-digest drop every
//! tag of the deleted manifest. Protect snapshots the manifests that
//! retained tags share with candidates; restore pushes them back under
//! the retained names.

use std::collections::BTreeMap;

use regsweep_registry::{compute_digest, MediaType, RegistryApi, RegistryError};

use crate::error::{Result, SweepError};
use crate::model::{Candidate, ProtectedManifest};

/// Runs the cleanup phases for one [`Candidate`].
pub struct RepositoryCleaner<'a> {
    registry: &'a dyn RegistryApi,
    candidate: &'a Candidate,
    repository: String,
    protected: BTreeMap<String, ProtectedManifest>,
}

impl<'a> RepositoryCleaner<'a> {
    /// Creates a cleaner for `candidate`.
    #[must_use]
    pub fn new(registry: &'a dyn RegistryApi, candidate: &'a Candidate) -> Self {
        Self {
            registry,
            repository: candidate.full_name(),
            candidate,
            protected: BTreeMap::new(),
        }
    }

    /// Full repository name.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Manifests captured by [`protect`](Self::protect), keyed by digest.
    #[must_use]
    pub const fn protected(&self) -> &BTreeMap<String, ProtectedManifest> {
        &self.protected
    }

    /// Snapshots every protected digest.
    ///
    /// Fails on the first digest that cannot be pulled or whose content
    /// does not hash to the digest; nothing is kept from a failed attempt.
    pub async fn protect(&mut self) -> Result<()> {
        self.protected.clear();
        if !self.candidate.needs_protection() {
            return Ok(());
        }

        for (digest, tag_names) in &self.candidate.protected {
            match self.snapshot(digest, tag_names).await {
                Ok(manifest) => {
                    tracing::debug!(
                        repository = %self.repository,
                        digest = %digest,
                        media_type = %manifest.media_type,
                        tags = ?tag_names,
                        "Protected manifest"
                    );
                    self.protected.insert(digest.clone(), manifest);
                }
                Err(e) => {
                    self.protected.clear();
                    return Err(e);
                }
            }
        }

        tracing::info!(repository = %self.repository, count = self.protected.len(), "Protected shared digests");
        Ok(())
    }

    async fn snapshot(&self, digest: &str, tag_names: &[String]) -> Result<ProtectedManifest> {
        let pulled = self
            .registry
            .pull_manifest(&self.repository, digest, &MediaType::ACCEPTED)
            .await
            .map_err(|source| SweepError::ProtectFailed {
                repository: self.repository.clone(),
                digest: digest.to_string(),
                source,
            })?;

        // Schema 1 digests cover the payload without its signatures.
        if !pulled.media_type.is_schema1() {
            let actual = compute_digest(&pulled.payload);
            if actual != digest {
                return Err(SweepError::DigestMismatch {
                    repository: self.repository.clone(),
                    expected: digest.to_string(),
                    actual,
                });
            }
        }

        Ok(ProtectedManifest {
            tag_names: tag_names.to_vec(),
            media_type: pulled.media_type,
            payload: pulled.payload,
        })
    }

    /// Deletes every candidate tag, returning how many were removed.
    ///
    /// Failures are logged and do not stop the loop. A tag that is already
    /// gone, typically removed along with a sibling of the same digest, is
    /// not counted.
    pub async fn delete(&self) -> usize {
        let mut deleted = 0;

        for tag in &self.candidate.tags {
            match self
                .registry
                .delete_tag(&self.candidate.project, &self.candidate.repository, &tag.name)
                .await
            {
                Ok(()) => {
                    deleted += 1;
                    tracing::debug!(repository = %self.repository, tag = %tag.name, "Deleted tag");
                }
                Err(RegistryError::NotFound { .. }) => {
                    tracing::debug!(repository = %self.repository, tag = %tag.name, "Tag already gone");
                }
                Err(e) => {
                    tracing::warn!(
                        repository = %self.repository,
                        tag = %tag.name,
                        error = %e,
                        "Failed to delete tag"
                    );
                }
            }
        }

        tracing::info!(
            repository = %self.repository,
            deleted,
            candidates = self.candidate.tags.len(),
            "Deleted tags"
        );
        deleted
    }

    /// Pushes every protected manifest back under each of its tag names.
    ///
    /// Stops at the first failure.
    pub async fn restore(&self) -> Result<()> {
        for (digest, manifest) in &self.protected {
            tracing::info!(
                repository = %self.repository,
                digest = %digest,
                tags = ?manifest.tag_names,
                "Restoring tags"
            );

            for tag in &manifest.tag_names {
                let pushed = self
                    .registry
                    .push_manifest(
                        &self.repository,
                        tag,
                        manifest.media_type.as_str(),
                        &manifest.payload,
                    )
                    .await
                    .map_err(|source| SweepError::RestoreFailed {
                        repository: self.repository.clone(),
                        tag: tag.clone(),
                        source,
                    })?;

                if !manifest.media_type.is_schema1() && &pushed != digest {
                    return Err(SweepError::DigestMismatch {
                        repository: self.repository.clone(),
                        expected: digest.clone(),
                        actual: pushed,
                    });
                }
            }
        }

        Ok(())
    }
}
