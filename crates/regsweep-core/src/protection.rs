//! Digest protection resolution.
//!
//! Deleting a tag by name may remove every tag that points at the same
//! manifest. Before a candidate is deleted, the retained tags sharing its
//! digest are recorded so their content can be restored afterwards.

use std::collections::{BTreeMap, HashMap};

use crate::model::{Candidate, RepoTagSet, Tag};

/// Builds the [`Candidate`] for one repository from a policy's split of its
/// tags, or `None` when nothing is to be deleted.
///
/// `protected` maps each candidate digest also referenced by a retained
/// tag to the names of those retained tags, in the order they were retained.
#[must_use]
pub fn resolve(set: &RepoTagSet, candidates: Vec<Tag>, retained: &[Tag]) -> Option<Candidate> {
    if candidates.is_empty() {
        return None;
    }

    let mut retained_by_digest: HashMap<&str, Vec<String>> = HashMap::new();
    for tag in retained {
        retained_by_digest
            .entry(tag.digest.as_str())
            .or_default()
            .push(tag.name.clone());
    }

    let protected: BTreeMap<String, Vec<String>> = candidates
        .iter()
        .filter_map(|t| {
            retained_by_digest
                .get(t.digest.as_str())
                .map(|names| (t.digest.clone(), names.clone()))
        })
        .collect();

    Some(Candidate {
        project: set.project.clone(),
        repository: set.repository.clone(),
        tags: candidates,
        protected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn tag(name: &str, digest: &str, age: i64) -> Tag {
        let epoch = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        Tag::new(name, digest, epoch - Duration::hours(age))
    }

    fn set() -> RepoTagSet {
        RepoTagSet::new("library", "app", Vec::new())
    }

    #[test]
    fn test_no_candidates_yields_nothing() {
        assert!(resolve(&set(), Vec::new(), &[tag("v1", "sha256:a", 1)]).is_none());
    }

    #[test]
    fn test_shared_digest_is_protected() {
        let candidates = vec![tag("v1", "sha256:a", 3), tag("v0", "sha256:b", 4)];
        let retained = vec![tag("stable", "sha256:a", 1), tag("latest", "sha256:a", 2)];

        let candidate = resolve(&set(), candidates, &retained).unwrap();

        assert_eq!(candidate.tags.len(), 2);
        assert_eq!(candidate.protected.len(), 1);
        assert_eq!(
            candidate.protected["sha256:a"],
            vec!["stable".to_string(), "latest".to_string()]
        );
    }

    #[test]
    fn test_candidate_tags_never_protected() {
        let candidates = vec![tag("v1", "sha256:a", 3), tag("v1-alias", "sha256:a", 3)];
        let candidate = resolve(&set(), candidates, &[]).unwrap();
        assert!(!candidate.needs_protection());
    }
}
