//! Tag inventory collection.
//!
//! The inventory is read fresh for every run. Any listing failure aborts
//! collection: policies never see a partial inventory.

use regsweep_registry::{split_repository, Project, RegistryApi};

use crate::error::{Result, SweepError};
use crate::model::{RepoTagSet, Tag};

/// Resolves the configured project names against the registry.
///
/// An empty `names` selects every project. Otherwise each name must match
/// a project exactly, in the order given.
pub async fn resolve_projects(registry: &dyn RegistryApi, names: &[String]) -> Result<Vec<Project>> {
    let projects = registry
        .list_all_projects(None, None)
        .await
        .map_err(|e| SweepError::registry("list projects", e))?;

    if names.is_empty() {
        return Ok(projects);
    }

    names
        .iter()
        .map(|name| {
            projects
                .iter()
                .find(|p| &p.name == name)
                .cloned()
                .ok_or_else(|| SweepError::ProjectNotFound {
                    project: name.clone(),
                })
        })
        .collect()
}

/// Lists every tag of every repository in the configured projects.
pub async fn collect_inventory(
    registry: &dyn RegistryApi,
    project_names: &[String],
) -> Result<Vec<RepoTagSet>> {
    let projects = resolve_projects(registry, project_names).await?;
    let mut inventory = Vec::new();

    for project in &projects {
        tracing::info!(project = %project.name, "Collecting images");

        let repositories = registry
            .list_all_repositories(project.id)
            .await
            .map_err(|e| {
                SweepError::registry(format!("list repositories of project '{}'", project.name), e)
            })?;

        for repository in &repositories {
            let (owner, name) = split_repository(&repository.name);
            let tags = registry.list_tags(owner, name).await.map_err(|e| {
                SweepError::registry(format!("list tags of '{}'", repository.name), e)
            })?;

            tracing::debug!(repository = %repository.name, count = tags.len(), "Listed tags");
            inventory.push(RepoTagSet::new(
                project.name.clone(),
                name,
                tags.into_iter().map(Tag::from).collect(),
            ));
        }
    }

    tracing::info!(
        projects = projects.len(),
        repositories = inventory.len(),
        "Inventory collected"
    );
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regsweep_test::{fixtures::hours_ago, MockRegistry};

    fn registry() -> MockRegistry {
        let registry = MockRegistry::new();
        registry.add_image("library/nginx", "1.25", "nginx-1.25", hours_ago(5));
        registry.add_image("library/nginx", "1.26", "nginx-1.26", hours_ago(1));
        registry.add_image("team/tools/builder", "v1", "builder-v1", hours_ago(2));
        registry
    }

    #[tokio::test]
    async fn test_collects_all_projects() {
        let registry = registry();
        let inventory = collect_inventory(&registry, &[]).await.unwrap();

        assert_eq!(inventory.len(), 2);
        let nginx = inventory.iter().find(|s| s.repository == "nginx").unwrap();
        assert_eq!(nginx.project, "library");
        let names: Vec<_> = nginx.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["1.26", "1.25"]);

        let builder = inventory.iter().find(|s| s.project == "team").unwrap();
        assert_eq!(builder.repository, "tools/builder");
    }

    #[tokio::test]
    async fn test_configured_projects_only() {
        let registry = registry();
        let inventory = collect_inventory(&registry, &["team".to_string()]).await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].full_name(), "team/tools/builder");
    }

    #[tokio::test]
    async fn test_unknown_project_is_not_found() {
        let registry = registry();
        let err = collect_inventory(&registry, &["library".to_string(), "ghost".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_project_name_must_match_exactly() {
        let registry = registry();
        let err = resolve_projects(&registry, &["lib".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_tag_listing_failure_aborts() {
        let registry = registry();
        registry.fail_list_tags("library/nginx");
        let err = collect_inventory(&registry, &[]).await.unwrap_err();
        assert!(matches!(err, SweepError::Registry { .. }));
    }
}
