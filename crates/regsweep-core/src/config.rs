//! Sweep configuration.
//!
//! Configuration is read from a YAML file:
//!
//! ```yaml
//! host: https://harbor.example.com
//! version: "1.7"
//! auth:
//!   user: admin
//!   password: secret
//! caCert: /etc/ssl/harbor-ca.pem
//! projects: [library]
//! policy:
//!   type: number
//!   numberPolicy:
//!     number: 5
//!   retainTags: ["release-*"]
//! trigger:
//!   cron: "0 0 * * *"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use regsweep_registry::{RegistryAuth, RegistryConfig, TlsConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::scheduler::parse_schedule;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/workspace/config.yaml";

fn default_version() -> String {
    "1.7".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepConfig {
    /// Registry address; `http://` is assumed when no scheme is given.
    pub host: String,

    /// Registry API generation, normalized to `major.minor`.
    #[serde(default = "default_version")]
    pub version: String,

    /// Registry credentials.
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure: bool,

    /// PEM bundle trusted in addition to the system roots.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Projects to sweep; empty means every project.
    #[serde(default)]
    pub projects: Vec<String>,

    /// Retention policy.
    pub policy: PolicyConfig,

    /// Cron trigger; absent means run once.
    #[serde(default)]
    pub trigger: Option<TriggerConfig>,
}

/// Registry credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Username.
    pub user: String,

    /// Password.
    pub password: String,
}

/// Retention policy selection and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Policy type: `number`, `regex` or `recentlyNotTouched`.
    #[serde(rename = "type")]
    pub policy_type: String,

    /// Parameters of the `number` policy.
    #[serde(default)]
    pub number_policy: Option<NumberPolicyConfig>,

    /// Parameters of the `regex` policy.
    #[serde(default)]
    pub regex_policy: Option<RegexPolicyConfig>,

    /// Parameters of the `recentlyNotTouched` policy.
    #[serde(default)]
    pub not_touched_policy: Option<NotTouchedPolicyConfig>,

    /// Globs naming tags that are never deleted.
    #[serde(default)]
    pub retain_tags: Vec<String>,
}

impl PolicyConfig {
    /// Creates a policy configuration of the given type with no parameters.
    pub fn new(policy_type: impl Into<String>) -> Self {
        Self {
            policy_type: policy_type.into(),
            number_policy: None,
            regex_policy: None,
            not_touched_policy: None,
            retain_tags: Vec::new(),
        }
    }

    /// A `number` policy keeping the newest `number` tags.
    #[must_use]
    pub fn number(number: i64) -> Self {
        Self {
            number_policy: Some(NumberPolicyConfig { number }),
            ..Self::new("number")
        }
    }

    /// A `regex` policy.
    #[must_use]
    pub fn regex(repos: Vec<String>, tags: Vec<String>) -> Self {
        Self {
            regex_policy: Some(RegexPolicyConfig { repos, tags }),
            ..Self::new("regex")
        }
    }

    /// A `recentlyNotTouched` policy with a window of `time` seconds.
    #[must_use]
    pub fn not_touched(time: u64) -> Self {
        Self {
            not_touched_policy: Some(NotTouchedPolicyConfig { time }),
            ..Self::new("recentlyNotTouched")
        }
    }

    /// Sets the retain globs.
    #[must_use]
    pub fn with_retain_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retain_tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Parameters of the `number` policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberPolicyConfig {
    /// Number of newest tags to keep per repository.
    pub number: i64,
}

/// Parameters of the `regex` policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexPolicyConfig {
    /// Repository name patterns (without the project prefix).
    #[serde(default)]
    pub repos: Vec<String>,

    /// Tag name patterns.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Parameters of the `recentlyNotTouched` policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotTouchedPolicyConfig {
    /// Inactivity window in seconds.
    pub time: u64,
}

impl NotTouchedPolicyConfig {
    /// The inactivity window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.time)
    }
}

/// Cron trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Cron expression, 5-field standard or 6/7-field with seconds.
    #[serde(default)]
    pub cron: String,
}

impl SweepConfig {
    /// Reads, parses and normalizes a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SweepError::ConfigLoad {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        tracing::debug!(path = %path.display(), policy = %config.policy.policy_type, "Loaded configuration");
        Ok(config)
    }

    /// Parses and normalizes a YAML configuration.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(raw)
            .map_err(|e| SweepError::config(format!("malformed configuration: {e}")))?;
        config.normalize()?;
        Ok(config)
    }

    /// Normalizes the version and validates the host and cron trigger.
    pub fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(SweepError::config("host is required"));
        }

        let trimmed = self.version.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        match trimmed.get(..3) {
            Some(major_minor) => self.version = major_minor.to_string(),
            None => {
                return Err(SweepError::config(format!(
                    "unrecognized version '{}', expected a version like 1.4 or 1.7.5",
                    self.version
                )))
            }
        }

        if let Some(expr) = self.cron_expression() {
            parse_schedule(expr)?;
        }

        Ok(())
    }

    /// The cron expression, if a non-empty trigger is configured.
    #[must_use]
    pub fn cron_expression(&self) -> Option<&str> {
        self.trigger
            .as_ref()
            .map(|t| t.cron.trim())
            .filter(|c| !c.is_empty())
    }

    /// Builds the registry client configuration.
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        let mut config = RegistryConfig::new(self.host.trim())
            .with_version(self.version.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs));

        if let Some(auth) = &self.auth {
            config = config.with_auth(RegistryAuth::basic(&auth.user, &auth.password));
        }
        if self.insecure || self.ca_cert.is_some() {
            let mut tls = TlsConfig::new();
            if let Some(path) = &self.ca_cert {
                tls = tls.with_ca_cert(path.clone());
            }
            if self.insecure {
                tls = tls.insecure();
            }
            config = config.with_tls(tls);
        }

        config
    }
}
