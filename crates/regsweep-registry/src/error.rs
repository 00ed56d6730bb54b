//! Error types for registry operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`RegistryError`].
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to connect to registry.
    #[error("Failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Registry URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },

    /// Requested resource does not exist.
    #[error("Not found: {resource}")]
    NotFound {
        /// Resource description (project, repository, tag or manifest reference).
        resource: String,
    },

    /// HTTP error from registry.
    #[error("HTTP error from registry: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Invalid URL.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// URL string.
        url: String,
    },

    /// The registry answered with something the client cannot interpret.
    #[error("Invalid response from registry: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },

    /// Manifest pull failed.
    #[error("Failed to pull manifest {repository}@{reference}: {message}")]
    ManifestPullFailed {
        /// Repository (`project/repo`).
        repository: String,
        /// Tag or digest.
        reference: String,
        /// Error message.
        message: String,
    },

    /// Manifest push failed.
    #[error("Failed to push manifest for {repository}:{tag}: {message}")]
    ManifestPushFailed {
        /// Repository (`project/repo`).
        repository: String,
        /// Tag being pushed.
        tag: String,
        /// Error message.
        message: String,
    },

    /// Reading a local file, such as a CA bundle, failed.
    #[error("File I/O error at {path}: {source}")]
    IoError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    /// Returns true if the error means the current credentials were rejected
    /// or the registry is in a state where logging in again may help.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        match self {
            Self::AuthenticationFailed { .. } => true,
            Self::HttpError { status, .. } => *status == 401 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::ConnectionFailed {
                url: err
                    .url()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
                source: err,
            }
        } else if err.is_status() {
            let status = err.status().map_or(0, |s| s.as_u16());
            Self::HttpError {
                status,
                message: err.to_string(),
            }
        } else {
            Self::HttpError {
                status: 0,
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = RegistryError::NotFound {
            resource: "project library".to_string(),
        };
        assert_eq!(err.to_string(), "Not found: project library");
    }

    #[test]
    fn test_error_display_auth_failed() {
        let err = RegistryError::AuthenticationFailed {
            message: "invalid token".to_string(),
        };
        assert_eq!(err.to_string(), "Authentication failed: invalid token");
    }

    #[test]
    fn test_error_display_push_failed() {
        let err = RegistryError::ManifestPushFailed {
            repository: "library/nginx".to_string(),
            tag: "latest".to_string(),
            message: "400 Bad Request".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to push manifest for library/nginx:latest: 400 Bad Request"
        );
    }

    #[test]
    fn test_auth_failure_classification() {
        let unauthorized = RegistryError::HttpError {
            status: 401,
            message: String::new(),
        };
        let internal = RegistryError::HttpError {
            status: 502,
            message: String::new(),
        };
        let missing = RegistryError::HttpError {
            status: 404,
            message: String::new(),
        };

        assert!(unauthorized.is_auth_failure());
        assert!(internal.is_auth_failure());
        assert!(!missing.is_auth_failure());
        assert!(!RegistryError::InvalidUrl {
            url: "x".to_string()
        }
        .is_auth_failure());
    }
}
