//! Retention policies.
//!
//! A policy turns a repository inventory into deletion candidates. Three
//! policies are available, selected by `policy.type`:
//!
//! | Type | Policy |
//! |------|--------|
//! | `number` | [`NumberPolicy`] keeps the newest N tags |
//! | `regex` | [`RegexPolicy`] deletes tags matching name patterns |
//! | `recentlyNotTouched` | [`TouchPolicy`] deletes tags not pulled recently |
//!
//! Every policy honours the retain globs and hands its split to
//! [`protection::resolve`](crate::protection::resolve), so candidates
//! always carry their protected digests.

mod number;
mod regex;
mod touch;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use regsweep_registry::RegistryApi;

use crate::config::PolicyConfig;
use crate::error::{Result, SweepError};
use crate::model::{Candidate, RepoTagSet};
use crate::retain::RetainPatterns;

pub use self::number::NumberPolicy;
pub use self::regex::RegexPolicy;
pub use self::touch::TouchPolicy;

/// Policy type names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyType {
    /// Keep the newest N tags.
    Number,

    /// Delete tags matching patterns.
    Regex,

    /// Delete tags with no recent access.
    RecentlyNotTouched,
}

impl PolicyType {
    /// Configuration name of the policy type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Regex => "regex",
            Self::RecentlyNotTouched => "recentlyNotTouched",
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyType {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "number" => Ok(Self::Number),
            "regex" => Ok(Self::Regex),
            "recentlyNotTouched" => Ok(Self::RecentlyNotTouched),
            other => Err(SweepError::config(format!(
                "unsupported policy type '{other}', expected one of: number, regex, recentlyNotTouched"
            ))),
        }
    }
}

/// Selects deletion candidates from an inventory.
#[async_trait]
pub trait RetentionPolicy: Send + Sync {
    /// The policy's type.
    fn policy_type(&self) -> PolicyType;

    /// Returns one [`Candidate`] per repository with at least one tag to
    /// delete, in inventory order.
    async fn list_candidates(&self, inventory: &[RepoTagSet]) -> Result<Vec<Candidate>>;
}

/// Builds the configured policy, validating its parameters.
///
/// Nothing is requested from the registry here; the registry is only
/// used later by policies that need more than the tag inventory.
pub fn build_policy(
    config: &PolicyConfig,
    registry: Arc<dyn RegistryApi>,
) -> Result<Box<dyn RetentionPolicy>> {
    let policy_type: PolicyType = config.policy_type.trim().parse()?;
    let retain = RetainPatterns::new(&config.retain_tags)?;

    let policy: Box<dyn RetentionPolicy> = match policy_type {
        PolicyType::Number => {
            let params = config.number_policy.as_ref().ok_or_else(|| {
                SweepError::config("policy.numberPolicy is required when policy.type is 'number'")
            })?;
            let keep = usize::try_from(params.number).map_err(|_| {
                SweepError::config(format!(
                    "policy.numberPolicy.number must not be negative, got {}",
                    params.number
                ))
            })?;
            Box::new(NumberPolicy::new(keep, retain))
        }
        PolicyType::Regex => {
            let params = config.regex_policy.as_ref().ok_or_else(|| {
                SweepError::config("policy.regexPolicy is required when policy.type is 'regex'")
            })?;
            Box::new(RegexPolicy::new(&params.repos, &params.tags, retain)?)
        }
        PolicyType::RecentlyNotTouched => {
            let params = config.not_touched_policy.as_ref().ok_or_else(|| {
                SweepError::config(
                    "policy.notTouchedPolicy is required when policy.type is 'recentlyNotTouched'",
                )
            })?;
            Box::new(TouchPolicy::new(registry, params.window(), retain))
        }
    };

    tracing::debug!(policy = %policy.policy_type(), retain_patterns = config.retain_tags.len(), "Built retention policy");
    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regsweep_test::MockRegistry;

    fn registry() -> Arc<dyn RegistryApi> {
        Arc::new(MockRegistry::new())
    }

    #[test]
    fn test_policy_type_parse() {
        assert_eq!("number".parse::<PolicyType>().unwrap(), PolicyType::Number);
        assert_eq!("regex".parse::<PolicyType>().unwrap(), PolicyType::Regex);
        assert_eq!(
            "recentlyNotTouched".parse::<PolicyType>().unwrap(),
            PolicyType::RecentlyNotTouched
        );
        assert!("lru".parse::<PolicyType>().unwrap_err().is_config());
    }

    #[test]
    fn test_policy_type_display_roundtrip() {
        for t in [PolicyType::Number, PolicyType::Regex, PolicyType::RecentlyNotTouched] {
            assert_eq!(t.to_string().parse::<PolicyType>().unwrap(), t);
        }
    }

    #[test]
    fn test_build_each_policy() {
        let number = build_policy(&PolicyConfig::number(3), registry()).unwrap();
        assert_eq!(number.policy_type(), PolicyType::Number);

        let regex = build_policy(
            &PolicyConfig::regex(vec![".*".into()], vec!["v.*".into()]),
            registry(),
        )
        .unwrap();
        assert_eq!(regex.policy_type(), PolicyType::Regex);

        let touch = build_policy(&PolicyConfig::not_touched(3600), registry()).unwrap();
        assert_eq!(touch.policy_type(), PolicyType::RecentlyNotTouched);
    }

    #[test]
    fn test_build_unknown_type() {
        let err = build_policy(&PolicyConfig::new("oldest"), registry()).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_build_missing_parameters() {
        for t in ["number", "regex", "recentlyNotTouched"] {
            let err = build_policy(&PolicyConfig::new(t), registry()).err().unwrap();
            assert!(err.is_config(), "{t} without parameters must be rejected");
        }
    }

    #[test]
    fn test_build_negative_number() {
        let err = build_policy(&PolicyConfig::number(-1), registry()).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn test_build_invalid_retain_glob() {
        let config = PolicyConfig::number(1).with_retain_tags(["[unclosed"]);
        let err = build_policy(&config, registry()).err().unwrap();
        assert!(err.is_config());
    }
}
