use crate::constants::{listing, server};
use crate::errors::ToolError;
use crate::services::filters::{validate_filters, FilterExpression};
use crate::services::insight_hub_api::{ErrorOperation, ErrorUpdate, ListQuery, PivotQuery};
use crate::services::logger::Logger;
use crate::services::resolver::InsightHubResolver;
use crate::services::tool_executor::ToolHandler;
use crate::utils::tool_errors::{invalid_arguments, unknown_action_error};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const INSIGHT_HUB_ACTIONS: &[&str] = &[
    "list_projects",
    "get_error",
    "get_error_latest_event",
    "get_event",
    "get_event_details",
    "list_project_errors",
    "list_project_events",
    "list_project_event_filters",
    "update_error",
];

const SEVERITIES: &[&str] = &["info", "warning", "error"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InsightHubAction {
    ListProjects {
        #[serde(default)]
        page_size: Option<usize>,
        #[serde(default)]
        page: Option<usize>,
    },
    GetError {
        #[serde(default)]
        project_id: Option<String>,
        error_id: String,
    },
    GetErrorLatestEvent {
        error_id: String,
    },
    GetEvent {
        event_id: String,
        #[serde(default)]
        project_id: Option<String>,
    },
    GetEventDetails {
        link: String,
    },
    ListProjectErrors {
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        filters: Option<FilterExpression>,
        #[serde(default)]
        sort: Option<String>,
        #[serde(default)]
        direction: Option<String>,
        #[serde(default)]
        per_page: Option<u32>,
    },
    ListProjectEvents {
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        filters: Option<FilterExpression>,
        #[serde(default)]
        sort: Option<String>,
        #[serde(default)]
        direction: Option<String>,
        #[serde(default)]
        per_page: Option<u32>,
    },
    ListProjectEventFilters {
        #[serde(default)]
        project_id: Option<String>,
    },
    UpdateError {
        #[serde(default)]
        project_id: Option<String>,
        error_id: String,
        operation: ErrorOperation,
        #[serde(default)]
        severity: Option<String>,
        #[serde(default)]
        assigned_collaborator_id: Option<String>,
        #[serde(default)]
        assigned_team_id: Option<String>,
        #[serde(default)]
        issue_url: Option<String>,
        #[serde(default)]
        issue_title: Option<String>,
    },
}

impl InsightHubAction {
    pub fn parse(args: Value) -> Result<Self, ToolError> {
        let action = args.get("action");
        let name = match action.and_then(|v| v.as_str()) {
            Some(name) if INSIGHT_HUB_ACTIONS.contains(&name) => name.to_string(),
            _ => return Err(unknown_action_error(server::TOOL_NAME, action, INSIGHT_HUB_ACTIONS)),
        };
        serde_json::from_value(args).map_err(|err| invalid_arguments(server::TOOL_NAME, &name, err))
    }
}

#[derive(Debug, Clone, Copy)]
enum Listing {
    Errors,
    Events,
}

impl Listing {
    fn as_str(self) -> &'static str {
        match self {
            Listing::Errors => "errors",
            Listing::Events => "events",
        }
    }
}

/// Serves the `insight_hub` tool on top of the resolver.
pub struct InsightHubManager {
    logger: Logger,
    resolver: Arc<InsightHubResolver>,
    app_base: String,
}

impl InsightHubManager {
    pub fn new(logger: Logger, resolver: Arc<InsightHubResolver>, app_base: impl Into<String>) -> Self {
        Self {
            logger: logger.child("insight_hub"),
            resolver,
            app_base: app_base.into(),
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        match InsightHubAction::parse(args)? {
            InsightHubAction::ListProjects { page_size, page } => self.list_projects(page_size, page).await,
            InsightHubAction::GetError { project_id, error_id } => {
                self.get_error(project_id.as_deref(), &error_id).await
            }
            InsightHubAction::GetErrorLatestEvent { error_id } => {
                self.resolver.api().view_latest_event(&error_id).await
            }
            InsightHubAction::GetEvent { event_id, project_id } => Ok(self
                .resolver
                .find_event_across_projects(&event_id, project_id.as_deref())
                .await?
                .unwrap_or(Value::Null)),
            InsightHubAction::GetEventDetails { link } => self.get_event_details(&link).await,
            InsightHubAction::ListProjectErrors {
                project_id,
                filters,
                sort,
                direction,
                per_page,
            } => {
                let query = ListQuery {
                    filters,
                    sort,
                    direction,
                    per_page,
                };
                self.list_filtered(Listing::Errors, project_id.as_deref(), query).await
            }
            InsightHubAction::ListProjectEvents {
                project_id,
                filters,
                sort,
                direction,
                per_page,
            } => {
                let query = ListQuery {
                    filters,
                    sort,
                    direction,
                    per_page,
                };
                self.list_filtered(Listing::Events, project_id.as_deref(), query).await
            }
            InsightHubAction::ListProjectEventFilters { project_id } => {
                self.list_project_event_filters(project_id.as_deref()).await
            }
            InsightHubAction::UpdateError {
                project_id,
                error_id,
                operation,
                severity,
                assigned_collaborator_id,
                assigned_team_id,
                issue_url,
                issue_title,
            } => {
                let update = ErrorUpdate {
                    operation,
                    severity,
                    assigned_collaborator_id,
                    assigned_team_id,
                    issue_url,
                    issue_title,
                };
                self.update_error(project_id.as_deref(), &error_id, update).await
            }
        }
    }

    async fn list_projects(&self, page_size: Option<usize>, page: Option<usize>) -> Result<Value, ToolError> {
        if self.resolver.project_api_key().is_some() {
            return Err(ToolError::invalid_params(
                "list_projects is not available when a project API key is configured",
            )
            .with_hint("Unset INSIGHT_HUB_PROJECT_API_KEY to browse every project."));
        }
        let projects = self.resolver.get_projects().await?;
        if projects.is_empty() {
            return Ok(Value::String("No projects found.".to_string()));
        }
        let page_size = page_size.unwrap_or(listing::DEFAULT_PAGE_SIZE).max(1);
        let page = page.unwrap_or(listing::DEFAULT_PAGE).max(1);
        let data: Vec<_> = projects
            .iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        Ok(serde_json::json!({ "data": data, "count": data.len() }))
    }

    async fn get_error(&self, project_id: Option<&str>, error_id: &str) -> Result<Value, ToolError> {
        let project = self.resolver.resolve_input_project(project_id).await?;
        let org = self.resolver.get_organization().await?;
        let api = self.resolver.api();
        let pivots_query = PivotQuery {
            summary_size: Some(listing::PIVOT_SUMMARY_SIZE),
            ..PivotQuery::default()
        };
        let (error_details, latest_event, pivots) = futures::try_join!(
            api.view_error(&project.id, error_id),
            api.view_latest_event(error_id),
            api.list_error_pivots(&project.id, error_id, &pivots_query),
        )?;
        let org_slug = org.slug.as_deref().unwrap_or(org.id.as_str());
        Ok(serde_json::json!({
            "error_details": error_details,
            "latest_event": latest_event,
            "pivots": pivots,
            "url": format!("{}/{}/{}/errors/{}", self.app_base, org_slug, project.slug, error_id),
        }))
    }

    async fn get_event_details(&self, link: &str) -> Result<Value, ToolError> {
        let (project_slug, event_id) = parse_event_link(link)?;
        let project = self
            .resolver
            .get_project_by_slug(&project_slug)
            .await?
            .ok_or_else(|| {
                ToolError::not_found("PROJECT_NOT_FOUND", "Project with the specified slug not found.")
            })?;
        self.resolver.api().view_event(&project.id, &event_id).await
    }

    /// Validates filters against the project schema before any listing call.
    async fn list_filtered(
        &self,
        listing: Listing,
        project_id: Option<&str>,
        query: ListQuery,
    ) -> Result<Value, ToolError> {
        let project = self.resolver.resolve_input_project(project_id).await?;
        if let Some(filters) = query.filters.as_ref().filter(|f| !f.is_empty()) {
            let fields = self.resolver.get_project_event_fields(&project).await?;
            validate_filters(filters, &fields)?;
        }
        let api = self.resolver.api();
        let body = match listing {
            Listing::Errors => api.list_project_errors(&project.id, &query).await?,
            Listing::Events => api.list_project_events(&project.id, &query).await?,
        };
        let count = body.as_array().map(Vec::len).unwrap_or(0);
        self.logger.debug(
            "Listed",
            Some(&serde_json::json!({ "kind": listing.as_str(), "project": project.id, "count": count })),
        );
        Ok(serde_json::json!({ "data": body, "count": count }))
    }

    async fn list_project_event_filters(&self, project_id: Option<&str>) -> Result<Value, ToolError> {
        let fields = match project_id {
            Some(_) => {
                let project = self.resolver.resolve_input_project(project_id).await?;
                self.resolver.get_project_event_fields(&project).await?
            }
            None => {
                self.resolver.get_current_project().await?;
                self.resolver.cached_current_event_fields().ok_or_else(|| {
                    ToolError::not_found("NO_EVENT_FILTERS", "No event filters found in cache.")
                        .with_hint("Pass project_id or configure a project API key.")
                })?
            }
        };
        Ok(serde_json::to_value(fields.as_ref())?)
    }

    async fn update_error(
        &self,
        project_id: Option<&str>,
        error_id: &str,
        update: ErrorUpdate,
    ) -> Result<Value, ToolError> {
        if update.operation == ErrorOperation::OverrideSeverity {
            match update.severity.as_deref() {
                Some(severity) if SEVERITIES.contains(&severity) => {}
                _ => {
                    return Err(ToolError::invalid_params(
                        "severity is required for override_severity",
                    )
                    .with_hint(format!("Use one of: {}.", SEVERITIES.join(", "))))
                }
            }
        }
        let project = self.resolver.resolve_input_project(project_id).await?;
        let status = self
            .resolver
            .api()
            .update_error(&project.id, error_id, &update)
            .await?;
        Ok(serde_json::json!({ "success": (200..300).contains(&status) }))
    }
}

/// Extracts `(project_slug, event_id)` from a dashboard link of the form
/// `https://<app host>/<org>/<project>/errors/<error>?event_id=<id>`.
pub fn parse_event_link(link: &str) -> Result<(String, String), ToolError> {
    let url = url::Url::parse(link)
        .map_err(|err| ToolError::invalid_params(format!("Invalid link {}: {}", link, err)))?;
    let project_slug = url
        .path_segments()
        .and_then(|mut segments| segments.nth(1))
        .filter(|slug| !slug.is_empty())
        .map(str::to_string);
    let event_id = url
        .query_pairs()
        .find(|(key, _)| key == "event_id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty());
    match (project_slug, event_id) {
        (Some(slug), Some(event)) => Ok((slug, event)),
        _ => Err(ToolError::invalid_params(
            "Both projectSlug and eventId must be present in the link",
        )),
    }
}

#[async_trait]
impl ToolHandler for InsightHubManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.handle_action(args).await
    }
}
