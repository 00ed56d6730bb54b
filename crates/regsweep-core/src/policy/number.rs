use async_trait::async_trait;

use super::{PolicyType, RetentionPolicy};
use crate::error::Result;
use crate::model::{Candidate, RepoTagSet, Tag};
use crate::protection;
use crate::retain::RetainPatterns;

/// Keeps the newest `keep` tags of every repository, plus older tags
/// matching a retain glob.
#[derive(Debug, Clone)]
pub struct NumberPolicy {
    keep: usize,
    retain: RetainPatterns,
}

impl NumberPolicy {
    /// Creates the policy.
    #[must_use]
    pub const fn new(keep: usize, retain: RetainPatterns) -> Self {
        Self { keep, retain }
    }

    /// Splits a newest-first tag list into `(candidates, retained)`.
    #[must_use]
    pub fn split(&self, tags: &[Tag]) -> (Vec<Tag>, Vec<Tag>) {
        let keep = self.keep.min(tags.len());
        let mut retained = tags[..keep].to_vec();
        let mut candidates = Vec::new();

        for tag in &tags[keep..] {
            if self.retain.retains(&tag.name) {
                retained.push(tag.clone());
            } else {
                candidates.push(tag.clone());
            }
        }

        (candidates, retained)
    }
}

#[async_trait]
impl RetentionPolicy for NumberPolicy {
    fn policy_type(&self) -> PolicyType {
        PolicyType::Number
    }

    async fn list_candidates(&self, inventory: &[RepoTagSet]) -> Result<Vec<Candidate>> {
        Ok(inventory
            .iter()
            .filter(|set| set.tags.len() > self.keep)
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
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn tags(names: &[&str]) -> Vec<Tag> {
        let epoch = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        names
            .iter()
            .zip(0i64..)
            .map(|(name, age)| Tag::new(*name, format!("sha256:{name}"), epoch - Duration::hours(age)))
            .collect()
    }

    fn names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_keeps_newest() {
        let policy = NumberPolicy::new(3, RetainPatterns::default());
        let (candidates, retained) = policy.split(&tags(&["t5", "t4", "t3", "t2", "t1"]));
        assert_eq!(names(&candidates), vec!["t2", "t1"]);
        assert_eq!(names(&retained), vec!["t5", "t4", "t3"]);
    }

    #[test]
    fn test_retain_glob_rescues_old_tag() {
        let policy = NumberPolicy::new(3, RetainPatterns::new(["t2"]).unwrap());
        let (candidates, retained) = policy.split(&tags(&["t5", "t4", "t3", "t2", "t1"]));
        assert_eq!(names(&candidates), vec!["t1"]);
        assert_eq!(names(&retained), vec!["t5", "t4", "t3", "t2"]);
    }

    #[test]
    fn test_keep_zero_deletes_everything_unretained() {
        let policy = NumberPolicy::new(0, RetainPatterns::new(["keep-*"]).unwrap());
        let (candidates, retained) = policy.split(&tags(&["a", "keep-me", "b"]));
        assert_eq!(names(&candidates), vec!["a", "b"]);
        assert_eq!(names(&retained), vec!["keep-me"]);
    }

    #[tokio::test]
    async fn test_small_repositories_are_omitted() {
        let policy = NumberPolicy::new(3, RetainPatterns::default());
        let inventory = vec![
            RepoTagSet::new("library", "small", tags(&["a", "b", "c"])),
            RepoTagSet::new("library", "big", tags(&["a", "b", "c", "d"])),
        ];

        let candidates = policy.list_candidates(&inventory).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].repository, "big");
        assert_eq!(names(&candidates[0].tags), vec!["d"]);
    }

    #[tokio::test]
    async fn test_shared_digest_with_kept_tag_is_protected() {
        let mut all = tags(&["latest", "v2", "v1"]);
        all[2].digest = all[0].digest.clone();
        let inventory = vec![RepoTagSet::new("library", "app", all)];

        let policy = NumberPolicy::new(2, RetainPatterns::default());
        let candidates = policy.list_candidates(&inventory).await.unwrap();

        let candidate = &candidates[0];
        assert_eq!(names(&candidate.tags), vec!["v1"]);
        assert_eq!(candidate.protected["sha256:latest"], vec!["latest".to_string()]);
    }

    proptest! {
        /// Candidates are the unretained tail beyond the newest `keep`.
        #[test]
        fn candidates_partition_the_tail(
            count in 0usize..12,
            keep in 0usize..8,
            retain_every in 1usize..5,
        ) {
            let names: Vec<String> = (0..count).map(|i| format!("t{i}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let all = tags(&refs);
            let retained_names: Vec<String> = (0..count)
                .filter(|i| i % retain_every == 0)
                .map(|i| format!("t{i}"))
                .collect();
            let policy = NumberPolicy::new(keep, RetainPatterns::new(&retained_names).unwrap());

            let (candidates, retained) = policy.split(&all);

            prop_assert_eq!(candidates.len() + retained.len(), count);
            prop_assert!(retained.len() >= keep.min(count));
            for tag in &candidates {
                let index: usize = tag.name[1..].parse().unwrap();
                prop_assert!(index >= keep);
                prop_assert!(!retained_names.contains(&tag.name));
            }
            for tag in &all[..keep.min(count)] {
                prop_assert!(retained.contains(tag));
            }
        }
    }
}
