//! End-to-end sweeps against an in-memory registry.
//!
//! The registry deletes every tag of a manifest when one of its tags is
//! deleted, unless a test says otherwise.

use std::sync::Arc;
use std::time::Duration;

use regsweep_core::{
    CronScheduler, DryRunSummary, PolicyConfig, SweepConfig, SweepError, Sweeper, TickOutcome,
};
use regsweep_registry::RegistryApi;
use regsweep_test::{fixtures::hours_ago, DeleteSemantics, MockRegistry, RegistryCall};

/// `library/app`, newest first:
///
/// | tag    | digest  |
/// |--------|---------|
/// | latest | d5      |
/// | v5     | d5      |
/// | v4     | d4      |
/// | stable | d2      |
/// | v3     | d3      |
/// | v2     | d2      |
/// | v1     | d1      |
///
/// `library/db` holds three unshared tags.
struct Scenario {
    registry: Arc<MockRegistry>,
    d2: String,
    d5: String,
}

fn scenario(semantics: DeleteSemantics) -> Scenario {
    let registry = Arc::new(MockRegistry::new().with_delete_semantics(semantics));
    registry.add_image("library/app", "v1", "app-1", hours_ago(70));
    let d2 = registry.add_image("library/app", "v2", "app-2", hours_ago(60));
    registry.add_image("library/app", "v3", "app-3", hours_ago(50));
    registry.tag_image("library/app", "stable", &d2, hours_ago(45));
    registry.add_image("library/app", "v4", "app-4", hours_ago(40));
    let d5 = registry.add_image("library/app", "v5", "app-5", hours_ago(30));
    registry.tag_image("library/app", "latest", &d5, hours_ago(20));

    registry.add_image("library/db", "13", "db-13", hours_ago(90));
    registry.add_image("library/db", "14", "db-14", hours_ago(80));
    registry.add_image("library/db", "15", "db-15", hours_ago(10));

    Scenario { registry, d2, d5 }
}

fn sweeper(registry: &Arc<MockRegistry>, policy: PolicyConfig) -> Sweeper {
    Sweeper::new(Arc::clone(registry) as Arc<dyn RegistryApi>, Vec::new(), policy)
}

// =============================================================================
// Planning
// =============================================================================

#[tokio::test]
async fn test_number_policy_plan() {
    let s = scenario(DeleteSemantics::Cascade);
    let candidates = sweeper(&s.registry, PolicyConfig::number(4)).dry_run().await.unwrap();

    let app = candidates.iter().find(|c| c.repository == "app").unwrap();
    let names: Vec<_> = app.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["v3", "v2", "v1"]);
    assert_eq!(app.protected.len(), 1);
    assert_eq!(app.protected[&s.d2], vec!["stable".to_string()]);
    assert!(!app.protected.contains_key(&s.d5));

    assert!(candidates.iter().all(|c| c.repository != "db"));
}

#[tokio::test]
async fn test_candidates_never_protect_their_own_names() {
    let s = scenario(DeleteSemantics::Cascade);
    let policy = PolicyConfig::number(2).with_retain_tags(["stable"]);
    let candidates = sweeper(&s.registry, policy).dry_run().await.unwrap();

    let app = candidates.iter().find(|c| c.repository == "app").unwrap();
    assert_eq!(app.protected[&s.d2], vec!["stable".to_string()]);
    assert!(app.tags.iter().any(|t| t.name == "v2"));
    for candidate in &candidates {
        for names in candidate.protected.values() {
            for name in names {
                assert!(candidate.tags.iter().all(|t| &t.name != name));
            }
        }
    }
}

#[tokio::test]
async fn test_dry_run_is_idempotent() {
    let s = scenario(DeleteSemantics::Cascade);
    let sweeper = sweeper(&s.registry, PolicyConfig::number(3));

    let first = sweeper.dry_run().await.unwrap();
    let second = sweeper.dry_run().await.unwrap();

    assert_eq!(first, second);
    assert!(s.registry.mutations().is_empty());
    let summary = DryRunSummary::from_candidates(&first);
    assert_eq!(summary.repository_count, 1);
    assert_eq!(summary.image_count, 4);
}

#[tokio::test]
async fn test_regex_empty_patterns_make_no_registry_calls() {
    let s = scenario(DeleteSemantics::Cascade);

    for policy in [
        PolicyConfig::regex(Vec::new(), vec![".*".to_string()]),
        PolicyConfig::regex(vec![".*".to_string()], Vec::new()),
    ] {
        let err = sweeper(&s.registry, policy).clean().await.unwrap_err();
        assert!(err.is_config());
    }
    assert!(s.registry.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_policy_type_aborts_before_listing() {
    let s = scenario(DeleteSemantics::Cascade);
    let err = sweeper(&s.registry, PolicyConfig::new("largest"))
        .clean()
        .await
        .unwrap_err();
    assert!(err.is_config());
    assert!(s.registry.calls().is_empty());
}

#[tokio::test]
async fn test_missing_project_is_fail_closed() {
    let s = scenario(DeleteSemantics::Cascade);
    let sweeper = Sweeper::new(
        Arc::clone(&s.registry) as Arc<dyn RegistryApi>,
        vec!["library".to_string(), "nope".to_string()],
        PolicyConfig::number(0),
    );

    let err = sweeper.clean().await.unwrap_err();
    assert!(matches!(err, SweepError::ProjectNotFound { ref project } if project == "nope"));
    assert!(s.registry.mutations().is_empty());
}

#[tokio::test]
async fn test_listing_failure_aborts_run() {
    let s = scenario(DeleteSemantics::Cascade);
    s.registry.fail_list_tags("library/db");

    let err = sweeper(&s.registry, PolicyConfig::number(1)).clean().await.unwrap_err();
    assert!(matches!(err, SweepError::Registry { .. }));
    assert!(s.registry.mutations().is_empty());
}

// =============================================================================
// Cleaning
// =============================================================================

#[tokio::test]
async fn test_clean_restores_protected_tags_under_cascading_deletes() {
    let s = scenario(DeleteSemantics::Cascade);

    let result = sweeper(&s.registry, PolicyConfig::number(4)).clean().await.unwrap();

    assert_eq!(result.repositories, 1);
    assert!(result.is_clean());
    assert_eq!(result.deleted, 3);
    assert_eq!(
        s.registry.tags("library/app"),
        vec!["stable", "latest", "v5", "v4"]
    );
    assert_eq!(s.registry.digest_of("library/app", "stable"), Some(s.d2));
    assert_eq!(s.registry.digest_of("library/app", "v2"), None);
    assert_eq!(s.registry.digest_of("library/app", "v1"), None);
    assert_eq!(s.registry.digest_of("library/app", "v3"), None);
    assert_eq!(s.registry.digest_of("library/app", "latest"), Some(s.d5));
}

#[tokio::test]
async fn test_clean_with_tag_only_deletes() {
    let s = scenario(DeleteSemantics::TagOnly);

    let result = sweeper(&s.registry, PolicyConfig::number(4)).clean().await.unwrap();

    assert_eq!(result.deleted, 3);
    assert_eq!(s.registry.digest_of("library/app", "stable"), Some(s.d2));
    let mut remaining = s.registry.tags("library/app");
    remaining.sort();
    assert_eq!(remaining, vec!["latest", "stable", "v4", "v5"]);
}

#[tokio::test]
async fn test_protect_failure_skips_only_that_repository() {
    let s = scenario(DeleteSemantics::Cascade);
    s.registry.fail_pull(&s.d5);

    let result = sweeper(&s.registry, PolicyConfig::number(1)).clean().await.unwrap();

    assert_eq!(result.skipped, 1);
    assert_eq!(result.repositories, 1);
    assert_eq!(result.deleted, 2);
    assert!(s
        .registry
        .mutations()
        .iter()
        .all(|call| !matches!(call, RegistryCall::DeleteTag { repository, .. } if repository == "library/app")));
    assert_eq!(s.registry.tags("library/app").len(), 7);
    assert_eq!(s.registry.tags("library/db"), vec!["15"]);
}

#[tokio::test]
async fn test_restore_failure_is_isolated() {
    let s = scenario(DeleteSemantics::Cascade);
    s.registry.fail_push("latest");

    let result = sweeper(&s.registry, PolicyConfig::number(1)).clean().await.unwrap();

    assert_eq!(result.restore_failures, 1);
    assert_eq!(result.repositories, 2);
    assert_eq!(s.registry.digest_of("library/app", "latest"), None);
    assert_eq!(s.registry.tags("library/db"), vec!["15"]);
}

#[tokio::test]
async fn test_second_clean_finds_nothing() {
    let s = scenario(DeleteSemantics::Cascade);
    let sweeper = sweeper(&s.registry, PolicyConfig::number(4));

    sweeper.clean().await.unwrap();
    let candidates = sweeper.dry_run().await.unwrap();

    assert!(candidates.is_empty());
}

#[tokio::test]
async fn test_clean_from_yaml_config() {
    let s = scenario(DeleteSemantics::Cascade);
    let config = SweepConfig::from_yaml(
        r#"
host: harbor.example.com
projects: [library]
policy:
  type: regex
  regexPolicy:
    repos: ["db"]
    tags: ["1[34]"]
"#,
    )
    .unwrap();

    let result = Sweeper::from_config(Arc::clone(&s.registry) as Arc<dyn RegistryApi>, &config)
        .clean()
        .await
        .unwrap();

    assert_eq!(result.deleted, 2);
    assert_eq!(s.registry.tags("library/db"), vec!["15"]);
    assert_eq!(s.registry.tags("library/app").len(), 7);
}

// =============================================================================
// Scheduling
// =============================================================================

#[tokio::test]
async fn test_scheduled_sweeps_are_single_flight() {
    let s = scenario(DeleteSemantics::Cascade);
    let sweeper = sweeper(&s.registry, PolicyConfig::number(4));
    let (release_tx, release_rx) = tokio::sync::watch::channel(false);

    let scheduler = CronScheduler::new("0 0 * * *", move || {
        let sweeper = sweeper.clone();
        let mut release = release_rx.clone();
        async move {
            let _ = release.wait_for(|released| *released).await;
            let _ = sweeper.clean().await;
        }
    })
    .unwrap()
    .with_acquire_timeout(Duration::from_millis(50));

    let first = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.trigger().await })
    };
    while scheduler.runs() == 0 {
        tokio::task::yield_now().await;
    }

    assert_eq!(scheduler.trigger().await, TickOutcome::Skipped);

    release_tx.send(true).unwrap();
    assert_eq!(first.await.unwrap(), TickOutcome::Ran);
    assert_eq!(scheduler.runs(), 1);
    assert_eq!(scheduler.skipped(), 1);
    assert_eq!(s.registry.digest_of("library/app", "stable"), Some(s.d2));
}
