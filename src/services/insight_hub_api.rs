use crate::errors::ToolError;
use crate::services::filters::FilterExpression;
use crate::services::http::RequestExecutor;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<bool>,
}

/// One entry of a project's filter schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventField {
    pub display_id: String,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub filter_options: FilterOptions,
    #[serde(default)]
    pub pivot_options: PivotOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOperation {
    OverrideSeverity,
    Assign,
    CreateIssue,
    LinkIssue,
    UnlinkIssue,
    Open,
    Snooze,
    Fix,
    Ignore,
    Delete,
    Discard,
    Undiscard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorUpdate {
    pub operation: ErrorOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_collaborator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_title: Option<String>,
}

impl ErrorUpdate {
    pub fn new(operation: ErrorOperation) -> Self {
        Self {
            operation,
            severity: None,
            assigned_collaborator_id: None,
            assigned_team_id: None,
            issue_url: None,
            issue_title: None,
        }
    }
}

/// Filters and ordering shared by the error and event listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Option<FilterExpression>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub per_page: Option<u32>,
}

impl ListQuery {
    fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self
            .filters
            .as_ref()
            .map(FilterExpression::to_query_pairs)
            .unwrap_or_default();
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.clone()));
        }
        if let Some(direction) = &self.direction {
            pairs.push(("direction".to_string(), direction.clone()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page".to_string(), per_page.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PivotQuery {
    pub filters: Option<FilterExpression>,
    pub summary_size: Option<usize>,
    pub pivots: Vec<String>,
    pub per_page: Option<u32>,
}

impl PivotQuery {
    fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self
            .filters
            .as_ref()
            .map(FilterExpression::to_query_pairs)
            .unwrap_or_default();
        if let Some(size) = self.summary_size {
            pairs.push(("summary_size".to_string(), size.to_string()));
        }
        for pivot in &self.pivots {
            pairs.push(("pivots[]".to_string(), pivot.clone()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page".to_string(), per_page.to_string()));
        }
        pairs
    }
}

/// Typed calls against the vendor Data Access API.
#[async_trait]
pub trait InsightHubApi: Send + Sync {
    async fn list_organizations(&self) -> Result<Vec<Organization>, ToolError>;

    /// Every project of the organization, all pages.
    async fn list_projects(&self, organization_id: &str) -> Result<Vec<Project>, ToolError>;

    async fn list_event_fields(&self, project_id: &str) -> Result<Vec<EventField>, ToolError>;

    async fn view_error(&self, project_id: &str, error_id: &str) -> Result<Value, ToolError>;

    async fn view_latest_event(&self, error_id: &str) -> Result<Value, ToolError>;

    async fn view_event(&self, project_id: &str, event_id: &str) -> Result<Value, ToolError>;

    async fn list_project_errors(&self, project_id: &str, query: &ListQuery) -> Result<Value, ToolError>;

    async fn list_project_events(&self, project_id: &str, query: &ListQuery) -> Result<Value, ToolError>;

    async fn list_error_pivots(
        &self,
        project_id: &str,
        error_id: &str,
        query: &PivotQuery,
    ) -> Result<Value, ToolError>;

    /// Returns the HTTP status of the update.
    async fn update_error(&self, project_id: &str, error_id: &str, update: &ErrorUpdate) -> Result<u16, ToolError>;
}

pub struct HttpInsightHubApi {
    executor: RequestExecutor,
}

impl HttpInsightHubApi {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    async fn get(&self, path: String) -> Result<Value, ToolError> {
        Ok(self.executor.execute(Method::GET, &path, None, false).await?.body)
    }

    async fn get_all(&self, path: String) -> Result<Value, ToolError> {
        Ok(self.executor.execute(Method::GET, &path, None, true).await?.body)
    }
}

/// Joins raw segments into an absolute path, percent-encoding each one with
/// the URL path rules (a space becomes `%20`, `/` is escaped).
fn api_path(segments: &[&str]) -> Result<String, ToolError> {
    let mut url = url::Url::parse("http://localhost/")
        .map_err(|err| ToolError::internal(format!("Failed to build path: {}", err)))?;
    url.path_segments_mut()
        .map_err(|_| ToolError::internal("Failed to build path: base cannot hold segments"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.path().to_string())
}

fn with_query(path: String, pairs: &[(String, String)]) -> Result<String, ToolError> {
    if pairs.is_empty() {
        return Ok(path);
    }
    let query = serde_urlencoded::to_string(pairs)
        .map_err(|err| ToolError::internal(format!("Failed to encode query: {}", err)))?;
    Ok(format!("{}?{}", path, query))
}

fn decode_list<T: serde::de::DeserializeOwned>(body: Value) -> Result<Vec<T>, ToolError> {
    if body.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(body)?)
}

#[async_trait]
impl InsightHubApi for HttpInsightHubApi {
    async fn list_organizations(&self) -> Result<Vec<Organization>, ToolError> {
        decode_list(self.get("/user/organizations".to_string()).await?)
    }

    async fn list_projects(&self, organization_id: &str) -> Result<Vec<Project>, ToolError> {
        let path = api_path(&["organizations", organization_id, "projects"])?;
        decode_list(self.get_all(path).await?)
    }

    async fn list_event_fields(&self, project_id: &str) -> Result<Vec<EventField>, ToolError> {
        decode_list(self.get(api_path(&["projects", project_id, "event_fields"])?).await?)
    }

    async fn view_error(&self, project_id: &str, error_id: &str) -> Result<Value, ToolError> {
        self.get(api_path(&["projects", project_id, "errors", error_id])?).await
    }

    async fn view_latest_event(&self, error_id: &str) -> Result<Value, ToolError> {
        self.get(api_path(&["errors", error_id, "latest_event"])?).await
    }

    async fn view_event(&self, project_id: &str, event_id: &str) -> Result<Value, ToolError> {
        self.get(api_path(&["projects", project_id, "events", event_id])?).await
    }

    async fn list_project_errors(&self, project_id: &str, query: &ListQuery) -> Result<Value, ToolError> {
        let path = with_query(api_path(&["projects", project_id, "errors"])?, &query.to_pairs())?;
        self.get(path).await
    }

    async fn list_project_events(&self, project_id: &str, query: &ListQuery) -> Result<Value, ToolError> {
        let path = with_query(api_path(&["projects", project_id, "events"])?, &query.to_pairs())?;
        self.get(path).await
    }

    async fn list_error_pivots(
        &self,
        project_id: &str,
        error_id: &str,
        query: &PivotQuery,
    ) -> Result<Value, ToolError> {
        let path = with_query(
            api_path(&["projects", project_id, "errors", error_id, "pivots"])?,
            &query.to_pairs(),
        )?;
        self.get(path).await
    }

    async fn update_error(&self, project_id: &str, error_id: &str, update: &ErrorUpdate) -> Result<u16, ToolError> {
        let path = api_path(&["projects", project_id, "errors", error_id])?;
        let body = serde_json::to_value(update)?;
        let response = self
            .executor
            .execute(Method::PATCH, &path, Some(&body), false)
            .await?;
        Ok(response.status)
    }
}
