use ::regex::Regex;
use async_trait::async_trait;

use super::{PolicyType, RetentionPolicy};
use crate::error::{Result, SweepError};
use crate::model::{Candidate, RepoTagSet, Tag};
use crate::protection;
use crate::retain::RetainPatterns;

/// Deletes tags whose names match a tag pattern, in repositories whose
/// names match a repository pattern.
///
/// Patterns are anchored: `v1.*` matches `v1.0` but not `xv1.0`.
/// Repository patterns are tested against the name without the project
/// prefix.
#[derive(Debug, Clone)]
pub struct RegexPolicy {
    repos: Vec<Regex>,
    tags: Vec<Regex>,
    retain: RetainPatterns,
}

impl RegexPolicy {
    /// Compiles the policy. Empty pattern lists are rejected: they would
    /// select nothing, which is never what was meant.
    pub fn new(repos: &[String], tags: &[String], retain: RetainPatterns) -> Result<Self> {
        if repos.is_empty() {
            return Err(SweepError::config(
                "policy.regexPolicy.repos is empty, nothing would be cleaned (did you mean '.*'?)",
            ));
        }
        if tags.is_empty() {
            return Err(SweepError::config(
                "policy.regexPolicy.tags is empty, nothing would be cleaned (did you mean '.*'?)",
            ));
        }

        Ok(Self {
            repos: compile_all(repos)?,
            tags: compile_all(tags)?,
            retain,
        })
    }

    /// Returns true if the repository is in scope.
    #[must_use]
    pub fn matches_repository(&self, repository: &str) -> bool {
        self.repos.iter().any(|r| r.is_match(repository))
    }

    /// Splits an in-scope repository's tags into `(candidates, retained)`.
    #[must_use]
    pub fn split(&self, tags: &[Tag]) -> (Vec<Tag>, Vec<Tag>) {
        tags.iter().cloned().partition(|t| {
            self.tags.iter().any(|r| r.is_match(&t.name)) && !self.retain.retains(&t.name)
        })
    }
}

fn anchor(pattern: &str) -> String {
    let mut anchored = String::with_capacity(pattern.len() + 2);
    if !pattern.starts_with('^') {
        anchored.push('^');
    }
    anchored.push_str(pattern);
    if !pattern.ends_with('$') {
        anchored.push('$');
    }
    anchored
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(&anchor(p))
                .map_err(|e| SweepError::config(format!("invalid regex '{p}': {e}")))
        })
        .collect()
}

#[async_trait]
impl RetentionPolicy for RegexPolicy {
    fn policy_type(&self) -> PolicyType {
        PolicyType::Regex
    }

    async fn list_candidates(&self, inventory: &[RepoTagSet]) -> Result<Vec<Candidate>> {
        Ok(inventory
            .iter()
            .filter(|set| self.matches_repository(&set.repository))
            .filter_map(|set| {
                let (candidates, retained) = self.split(&set.tags);
                protection::resolve(set, candidates, &retained)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn policy(repos: &[&str], tags: &[&str], retain: &[&str]) -> Result<RegexPolicy> {
        let owned = |v: &[&str]| v.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        RegexPolicy::new(
            &owned(repos),
            &owned(tags),
            RetainPatterns::new(retain).unwrap(),
        )
    }

    fn set(repository: &str, names: &[&str]) -> RepoTagSet {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        RepoTagSet::new(
            "library",
            repository,
            names
                .iter()
                .map(|n| Tag::new(*n, format!("sha256:{n}"), at))
                .collect(),
        )
    }

    #[test]
    fn test_anchor() {
        assert_eq!(anchor("v1.*"), "^v1.*$");
        assert_eq!(anchor("^v1"), "^v1$");
        assert_eq!(anchor("^v1$"), "^v1$");
    }

    #[test]
    fn test_empty_repo_patterns_rejected() {
        assert!(policy(&[], &[".*"], &[]).unwrap_err().is_config());
    }

    #[test]
    fn test_empty_tag_patterns_rejected() {
        assert!(policy(&[".*"], &[], &[]).unwrap_err().is_config());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        assert!(policy(&["("], &[".*"], &[]).unwrap_err().is_config());
    }

    #[test]
    fn test_patterns_are_anchored() {
        let policy = policy(&["app"], &["v1"], &[]).unwrap();
        assert!(policy.matches_repository("app"));
        assert!(!policy.matches_repository("my-app"));

        let (candidates, _) = policy.split(&set("app", &["v1", "v10", "xv1"]).tags);
        let names: Vec<_> = candidates.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["v1"]);
    }

    #[tokio::test]
    async fn test_out_of_scope_repositories_are_untouched() {
        let policy = policy(&["app"], &[".*"], &[]).unwrap();
        let inventory = vec![set("app", &["a"]), set("db", &["a"])];

        let candidates = policy.list_candidates(&inventory).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].repository, "app");
    }

    #[tokio::test]
    async fn test_retain_glob_overrides_tag_pattern() {
        let policy = policy(&[".*"], &["v.*"], &["v2.*"]).unwrap();
        let mut inventory = set("app", &["v2.0", "v1.0", "latest"]);
        inventory.tags[0].digest = "sha256:shared".to_string();
        inventory.tags[1].digest = "sha256:shared".to_string();

        let candidates = policy.list_candidates(&[inventory]).await.unwrap();
        let candidate = &candidates[0];
        let names: Vec<_> = candidate.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["v1.0"]);
        assert_eq!(candidate.protected["sha256:shared"], vec!["v2.0".to_string()]);
    }
}
