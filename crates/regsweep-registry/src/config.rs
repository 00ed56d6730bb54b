//! Configuration types for registry client.

use std::path::PathBuf;
use std::time::Duration;

/// Default interval between background session refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Configuration for the registry client.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry base URL (e.g., "<https://harbor.example.com>").
    pub url: String,

    /// Registry API generation in `major.minor` form (e.g., "1.7").
    pub version: String,

    /// Authentication configuration.
    pub auth: RegistryAuth,

    /// Request timeout.
    pub timeout: Duration,

    /// Interval between background session refreshes.
    pub refresh_interval: Duration,

    /// TLS configuration.
    pub tls: Option<TlsConfig>,

    /// User agent string.
    pub user_agent: String,
}

impl RegistryConfig {
    /// Creates a new registry configuration with the given host.
    ///
    /// A host without a scheme is assumed to speak plain HTTP, and trailing
    /// slashes are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use regsweep_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::new("harbor.example.com/");
    /// assert_eq!(config.url, "http://harbor.example.com");
    /// ```
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: normalize_url(&url.into()),
            version: "1.7".to_string(),
            auth: RegistryAuth::None,
            timeout: Duration::from_secs(30),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            tls: None,
            user_agent: format!("regsweep-registry/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the registry API version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the authentication method.
    #[must_use]
    pub fn with_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the background session refresh interval.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Sets the TLS configuration.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Returns the session login URL for the configured API version.
    ///
    /// Registries from 1.7 on moved the login form under `/c/`.
    ///
    /// # Examples
    ///
    /// ```
    /// use regsweep_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::new("https://harbor.example.com").with_version("1.4");
    /// assert_eq!(config.login_url(), "https://harbor.example.com/login");
    ///
    /// let config = config.with_version("1.8");
    /// assert_eq!(config.login_url(), "https://harbor.example.com/c/login");
    /// ```
    #[must_use]
    pub fn login_url(&self) -> String {
        if self.version.as_str() >= "1.7" {
            format!("{}/c/login", self.url)
        } else {
            format!("{}/login", self.url)
        }
    }
}

fn normalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Authentication methods for registry access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryAuth {
    /// No authentication (anonymous pulls, local development).
    None,

    /// Username/password, used both for the session login and for
    /// registry v2 token requests.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
}

impl RegistryAuth {
    /// Creates basic authentication.
    ///
    /// # Examples
    ///
    /// ```
    /// use regsweep_registry::RegistryAuth;
    ///
    /// let auth = RegistryAuth::basic("user", "pass");
    /// ```
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// TLS configuration.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Path to CA certificate file.
    pub ca_cert: Option<PathBuf>,

    /// Whether to skip certificate verification.
    pub insecure_skip_verify: bool,
}

impl TlsConfig {
    /// Creates a new TLS configuration with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ca_cert: None,
            insecure_skip_verify: false,
        }
    }

    /// Sets the CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Skips certificate verification. Self-signed registries only.
    #[must_use]
    pub const fn insecure(mut self) -> Self {
        self.insecure_skip_verify = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = RegistryConfig::new("https://example.com");
        assert_eq!(config.url, "https://example.com");
        assert_eq!(config.version, "1.7");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.refresh_interval, DEFAULT_REFRESH_INTERVAL);
    }

    #[test]
    fn test_config_adds_scheme() {
        let config = RegistryConfig::new("10.0.0.1:8080");
        assert_eq!(config.url, "http://10.0.0.1:8080");
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = RegistryConfig::new("https://example.com//");
        assert_eq!(config.url, "https://example.com");
    }

    #[test]
    fn test_login_url_by_version() {
        let old = RegistryConfig::new("https://example.com").with_version("1.6");
        assert_eq!(old.login_url(), "https://example.com/login");

        let new = RegistryConfig::new("https://example.com").with_version("1.7");
        assert_eq!(new.login_url(), "https://example.com/c/login");
    }

    #[test]
    fn test_basic_auth() {
        let auth = RegistryAuth::basic("user", "pass");
        assert!(matches!(
            auth,
            RegistryAuth::Basic { username, password }
            if username == "user" && password == "pass"
        ));
    }

    #[test]
    fn test_tls_config() {
        let tls = TlsConfig::new().with_ca_cert("/path/to/ca.crt").insecure();

        assert_eq!(tls.ca_cert, Some(PathBuf::from("/path/to/ca.crt")));
        assert!(tls.insecure_skip_verify);
    }
}
