use crate::constants::{cache_keys, filters::DENYLISTED_FIELDS};
use crate::errors::ToolError;
use crate::services::cache::{project_event_fields_key, CacheEntry, ResolutionCache};
use crate::services::insight_hub_api::{EventField, InsightHubApi, Organization, Project};
use crate::services::logger::Logger;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::Arc;

/// Lazily resolves organization, projects, current project and filter
/// schemas, memoizing each in the shared [`ResolutionCache`].
///
/// Two concurrent first resolutions of the same key may both fetch; the last
/// write wins. The current project is the exception: it is written with
/// `set_if_absent` and never replaced.
#[derive(Clone)]
pub struct InsightHubResolver {
    api: Arc<dyn InsightHubApi>,
    cache: Arc<ResolutionCache>,
    project_api_key: Option<String>,
    logger: Logger,
}

impl InsightHubResolver {
    pub fn new(
        api: Arc<dyn InsightHubApi>,
        cache: Arc<ResolutionCache>,
        project_api_key: Option<String>,
        logger: Logger,
    ) -> Self {
        Self {
            api,
            cache,
            project_api_key: project_api_key.filter(|key| !key.is_empty()),
            logger: logger.child("resolver"),
        }
    }

    pub fn project_api_key(&self) -> Option<&str> {
        self.project_api_key.as_deref()
    }

    pub fn api(&self) -> &Arc<dyn InsightHubApi> {
        &self.api
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub async fn get_organization(&self) -> Result<Arc<Organization>, ToolError> {
        if let Some(org) = self.cache.organization(cache_keys::ORGANIZATION) {
            return Ok(org);
        }
        let orgs = self.api.list_organizations().await?;
        let first = orgs.into_iter().next().ok_or_else(|| {
            ToolError::configuration("NO_ORGANIZATION", "No organizations found for the current user.")
                .with_hint("Check that the auth token belongs to a user with organization access.")
        })?;
        let org = Arc::new(first);
        self.cache
            .set(cache_keys::ORGANIZATION, CacheEntry::Organization(org.clone()));
        Ok(org)
    }

    pub async fn get_projects(&self) -> Result<Arc<Vec<Project>>, ToolError> {
        if let Some(projects) = self.cache.projects(cache_keys::PROJECTS) {
            return Ok(projects);
        }
        let org = self.get_organization().await?;
        let projects = Arc::new(self.api.list_projects(&org.id).await?);
        self.logger.debug(
            "Fetched projects",
            Some(&serde_json::json!({ "organization": org.id, "count": projects.len() })),
        );
        self.cache
            .set(cache_keys::PROJECTS, CacheEntry::Projects(projects.clone()));
        Ok(projects)
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Option<Project>, ToolError> {
        let projects = self.get_projects().await?;
        Ok(projects.iter().find(|p| p.id == project_id).cloned())
    }

    pub async fn get_project_by_slug(&self, slug: &str) -> Result<Option<Project>, ToolError> {
        let projects = self.get_projects().await?;
        Ok(projects.iter().find(|p| p.slug == slug).cloned())
    }

    /// The project whose API key matches the configured key, or `None` when
    /// no key is configured.
    pub async fn get_current_project(&self) -> Result<Option<Arc<Project>>, ToolError> {
        let Some(api_key) = self.project_api_key.as_deref() else {
            return Ok(None);
        };
        if let Some(project) = self.cached_current_project() {
            return Ok(Some(project));
        }

        let legacy = self
            .cache
            .projects(cache_keys::LEGACY_CURRENT_PROJECTS)
            .and_then(|list| list.iter().find(|p| p.api_key == api_key).cloned());
        let matched = match legacy {
            Some(project) => Some(project),
            None => {
                let projects = self.get_projects().await?;
                projects.iter().find(|p| p.api_key == api_key).cloned()
            }
        };
        let Some(project) = matched else {
            let org = self.get_organization().await?;
            return Err(ToolError::not_found(
                "PROJECT_NOT_FOUND",
                format!(
                    "Unable to find project with API key {} in organization {}.",
                    api_key, org.name
                ),
            ));
        };

        let fields = self.fetch_event_fields(&project).await?;
        self.cache.set(
            cache_keys::CURRENT_PROJECT_EVENT_FILTERS,
            CacheEntry::EventFields(fields),
        );
        let stored = self
            .cache
            .set_if_absent(cache_keys::CURRENT_PROJECT, CacheEntry::Project(Arc::new(project)));
        match stored {
            CacheEntry::Project(project) => {
                self.logger.debug(
                    "Resolved current project",
                    Some(&serde_json::json!({ "project": project.id })),
                );
                Ok(Some(project))
            }
            _ => Err(ToolError::internal("Current project cache slot holds a non-project entry")),
        }
    }

    fn cached_current_project(&self) -> Option<Arc<Project>> {
        self.cache.project(cache_keys::CURRENT_PROJECT)
    }

    /// Schema of the current project as cached during its resolution.
    pub fn cached_current_event_fields(&self) -> Option<Arc<Vec<EventField>>> {
        self.cache
            .event_fields(cache_keys::CURRENT_PROJECT_EVENT_FILTERS)
    }

    pub async fn get_project_event_fields(&self, project: &Project) -> Result<Arc<Vec<EventField>>, ToolError> {
        let is_current = self
            .cached_current_project()
            .map(|current| current.id == project.id)
            .unwrap_or(false);
        let key = if is_current {
            cache_keys::CURRENT_PROJECT_EVENT_FILTERS.to_string()
        } else {
            project_event_fields_key(&project.id)
        };
        if let Some(fields) = self.cache.event_fields(&key) {
            return Ok(fields);
        }
        let fields = self.fetch_event_fields(project).await?;
        self.cache.set(&key, CacheEntry::EventFields(fields.clone()));
        Ok(fields)
    }

    async fn fetch_event_fields(&self, project: &Project) -> Result<Arc<Vec<EventField>>, ToolError> {
        let mut fields = self.api.list_event_fields(&project.id).await?;
        fields.retain(|field| !DENYLISTED_FIELDS.contains(&field.display_id.as_str()));
        if fields.is_empty() {
            return Err(ToolError::configuration(
                "NO_EVENT_FIELDS",
                format!("No event fields found for project {}.", project.name),
            ));
        }
        Ok(Arc::new(fields))
    }

    /// Explicit id wins; otherwise the current project.
    pub async fn resolve_input_project(&self, project_id: Option<&str>) -> Result<Arc<Project>, ToolError> {
        if let Some(id) = project_id {
            return self
                .get_project(id)
                .await?
                .map(Arc::new)
                .ok_or_else(|| {
                    ToolError::not_found("PROJECT_NOT_FOUND", format!("Project with ID {} not found.", id))
                });
        }
        self.get_current_project().await?.ok_or_else(|| {
            ToolError::configuration(
                "NO_CURRENT_PROJECT",
                "No current project found. Please provide a projectId or configure a project API key.",
            )
        })
    }

    /// Looks the event up in one project, or in every project concurrently.
    /// Failed lookups count as misses; the first hit to complete wins.
    pub async fn find_event_across_projects(
        &self,
        event_id: &str,
        project_id: Option<&str>,
    ) -> Result<Option<Value>, ToolError> {
        if let Some(id) = project_id {
            let project = self.get_project(id).await?.ok_or_else(|| {
                ToolError::not_found("PROJECT_NOT_FOUND", format!("Project with ID {} not found.", id))
            })?;
            return match self.api.view_event(&project.id, event_id).await {
                Ok(event) if event.is_null() => Ok(None),
                Ok(event) => Ok(Some(event)),
                Err(err) if err.upstream_status() == Some(404) => Ok(None),
                Err(err) => Err(err),
            };
        }

        let projects = self.get_projects().await?;
        let mut lookups: FuturesUnordered<_> = projects
            .iter()
            .map(|project| {
                let api = self.api.clone();
                let project_id = project.id.clone();
                async move {
                    let result = api.view_event(&project_id, event_id).await;
                    (project_id, result)
                }
            })
            .collect();

        let mut found = None;
        let mut completed = 0usize;
        while let Some((project_id, result)) = lookups.next().await {
            match result {
                Ok(event) if !event.is_null() => {
                    if found.is_none() {
                        self.logger.debug(
                            "Event located",
                            Some(&serde_json::json!({
                                "event": event_id,
                                "project": project_id,
                                "completion_index": completed,
                            })),
                        );
                        found = Some(event);
                    }
                }
                Ok(_) => {}
                Err(err) => self.logger.debug(
                    "Event lookup failed",
                    Some(&serde_json::json!({
                        "event": event_id,
                        "project": project_id,
                        "error": err.message,
                    })),
                ),
            }
            completed += 1;
        }
        Ok(found)
    }

    /// Resolves organization, projects and (when configured) the current
    /// project up front so misconfiguration fails at startup.
    pub async fn initialize(&self) -> Result<(), ToolError> {
        let org = self.get_organization().await?;
        let projects = self.get_projects().await?;
        let current = self.get_current_project().await?;
        self.logger.info(
            "Initialized",
            Some(&serde_json::json!({
                "organization": org.name,
                "projects": projects.len(),
                "current_project": current.map(|p| p.id.clone()),
            })),
        );
        Ok(())
    }
}
