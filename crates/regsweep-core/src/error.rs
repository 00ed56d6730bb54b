//! Error types for sweep runs.
//!
//! Run-level errors ([`SweepError::Config`], [`SweepError::ProjectNotFound`]
//! and [`SweepError::Registry`]) abort a run before any mutation. The
//! repository-scoped variants are produced by the cleaner and isolated to
//! the repository that raised them.

use regsweep_registry::RegistryError;
use thiserror::Error;

/// Result type alias using [`SweepError`] as the error type.
pub type Result<T> = std::result::Result<T, SweepError>;

/// Errors that can occur while planning or running a sweep.
#[derive(Error, Debug)]
pub enum SweepError {
    /// Missing or invalid configuration.
    #[error("Invalid configuration: {reason}")]
    Config {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read configuration from {path}: {source}")]
    ConfigLoad {
        /// Path to the configuration file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configured project does not exist in the registry.
    #[error("Project '{project}' not found")]
    ProjectNotFound {
        /// Configured project name.
        project: String,
    },

    /// A registry call failed while collecting the inventory.
    #[error("Failed to {operation}: {source}")]
    Registry {
        /// What was being done.
        operation: String,
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },

    /// A protected manifest could not be pulled.
    #[error("Failed to protect {repository}@{digest}: {source}")]
    ProtectFailed {
        /// Full repository name.
        repository: String,
        /// Digest being protected.
        digest: String,
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },

    /// Manifest content does not hash to the expected digest.
    #[error("Digest mismatch for {repository}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Full repository name.
        repository: String,
        /// Digest the content should have.
        expected: String,
        /// Digest the content actually has.
        actual: String,
    },

    /// A protected manifest could not be pushed back under its tag.
    #[error("Failed to restore {repository}:{tag}: {source}")]
    RestoreFailed {
        /// Full repository name.
        repository: String,
        /// Tag being restored.
        tag: String,
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
}

impl SweepError {
    /// Creates a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Wraps a registry error raised while doing `operation`.
    pub fn registry(operation: impl Into<String>, source: RegistryError) -> Self {
        Self::Registry {
            operation: operation.into(),
            source,
        }
    }

    /// Returns true for configuration errors.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::ConfigLoad { .. })
    }

    /// Returns true when a configured project is missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ProjectNotFound { .. })
    }
}
