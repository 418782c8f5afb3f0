#![allow(dead_code)]

use async_trait::async_trait;
use hub_mcp::errors::ToolError;
use hub_mcp::services::error_reporter::ErrorReporter;
use hub_mcp::services::insight_hub_api::{
    ErrorUpdate, EventField, InsightHubApi, ListQuery, Organization, PivotQuery, Project,
};
use hub_mcp::services::logger::{LogLevel, Logger};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn quiet_logger() -> Logger {
    Logger::with_level("test", LogLevel::Error)
}

pub fn org(name: &str) -> Organization {
    Organization {
        id: "org-1".to_string(),
        name: name.to_string(),
        slug: Some("acme".to_string()),
    }
}

pub fn project(id: &str, api_key: &str) -> Project {
    Project {
        id: id.to_string(),
        name: format!("Project {}", id),
        slug: format!("{}-slug", id),
        api_key: api_key.to_string(),
    }
}

pub fn field(display_id: &str) -> EventField {
    serde_json::from_value(serde_json::json!({
        "display_id": display_id,
        "custom": false,
        "filter_options": { "name": display_id }
    }))
    .expect("valid event field")
}

#[derive(Clone)]
pub enum EventReply {
    Found(Value),
    Missing,
    Fail(u16),
}

/// In-memory vendor API counting every call.
#[derive(Default)]
pub struct FakeApi {
    pub organizations: Vec<Organization>,
    pub projects: Vec<Project>,
    pub fields: HashMap<String, Vec<EventField>>,
    pub events: HashMap<String, (EventReply, Duration)>,
    pub update_status: Option<u16>,
    pub project_fetch_delay: Duration,
    calls: Mutex<HashMap<&'static str, usize>>,
    pub last_error_query: Mutex<Option<ListQuery>>,
    pub last_event_query: Mutex<Option<ListQuery>>,
    pub last_update: Mutex<Option<(String, String, ErrorUpdate)>>,
}

impl FakeApi {
    pub fn new(organizations: Vec<Organization>, projects: Vec<Project>) -> Self {
        Self {
            organizations,
            projects,
            ..Self::default()
        }
    }

    pub fn with_fields(mut self, project_id: &str, fields: &[&str]) -> Self {
        self.fields
            .insert(project_id.to_string(), fields.iter().map(|f| field(f)).collect());
        self
    }

    pub fn with_event(mut self, project_id: &str, reply: EventReply, delay_ms: u64) -> Self {
        self.events
            .insert(project_id.to_string(), (reply, Duration::from_millis(delay_ms)));
        self
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn bump(&self, name: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(name).or_insert(0) += 1;
        }
    }
}

#[async_trait]
impl InsightHubApi for FakeApi {
    async fn list_organizations(&self) -> Result<Vec<Organization>, ToolError> {
        self.bump("list_organizations");
        Ok(self.organizations.clone())
    }

    async fn list_projects(&self, _organization_id: &str) -> Result<Vec<Project>, ToolError> {
        self.bump("list_projects");
        if !self.project_fetch_delay.is_zero() {
            tokio::time::sleep(self.project_fetch_delay).await;
        }
        Ok(self.projects.clone())
    }

    async fn list_event_fields(&self, project_id: &str) -> Result<Vec<EventField>, ToolError> {
        self.bump("list_event_fields");
        Ok(self.fields.get(project_id).cloned().unwrap_or_default())
    }

    async fn view_error(&self, project_id: &str, error_id: &str) -> Result<Value, ToolError> {
        self.bump("view_error");
        Ok(serde_json::json!({ "id": error_id, "project_id": project_id }))
    }

    async fn view_latest_event(&self, error_id: &str) -> Result<Value, ToolError> {
        self.bump("view_latest_event");
        Ok(serde_json::json!({ "id": "latest", "error_id": error_id }))
    }

    async fn view_event(&self, project_id: &str, event_id: &str) -> Result<Value, ToolError> {
        self.bump("view_event");
        let Some((reply, delay)) = self.events.get(project_id).cloned() else {
            return Err(ToolError::upstream(404, "not found"));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match reply {
            EventReply::Found(mut event) => {
                if let Value::Object(map) = &mut event {
                    map.insert("requested_id".to_string(), Value::String(event_id.to_string()));
                }
                Ok(event)
            }
            EventReply::Missing => Ok(Value::Null),
            EventReply::Fail(status) => Err(ToolError::upstream(status, "lookup failed")),
        }
    }

    async fn list_project_errors(&self, project_id: &str, query: &ListQuery) -> Result<Value, ToolError> {
        self.bump("list_project_errors");
        if let Ok(mut last) = self.last_error_query.lock() {
            *last = Some(query.clone());
        }
        Ok(serde_json::json!([{ "id": "error-1", "project_id": project_id }]))
    }

    async fn list_project_events(&self, project_id: &str, query: &ListQuery) -> Result<Value, ToolError> {
        self.bump("list_project_events");
        if let Ok(mut last) = self.last_event_query.lock() {
            *last = Some(query.clone());
        }
        Ok(serde_json::json!([
            { "id": "event-1", "project_id": project_id },
            { "id": "event-2", "project_id": project_id }
        ]))
    }

    async fn list_error_pivots(
        &self,
        _project_id: &str,
        _error_id: &str,
        _query: &PivotQuery,
    ) -> Result<Value, ToolError> {
        self.bump("list_error_pivots");
        Ok(serde_json::json!([{ "event_field_display_id": "user.email", "name": "User" }]))
    }

    async fn update_error(&self, project_id: &str, error_id: &str, update: &ErrorUpdate) -> Result<u16, ToolError> {
        self.bump("update_error");
        if let Ok(mut last) = self.last_update.lock() {
            *last = Some((project_id.to_string(), error_id.to_string(), update.clone()));
        }
        match self.update_status.unwrap_or(200) {
            status if (200..300).contains(&status) => Ok(status),
            status => Err(ToolError::upstream(status, "rejected")),
        }
    }
}

/// Captures every reported error.
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(String, Option<String>, String)>>,
}

impl RecordingReporter {
    pub fn messages(&self) -> Vec<String> {
        self.reports
            .lock()
            .map(|r| r.iter().map(|(_, _, m)| m.clone()).collect())
            .unwrap_or_default()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, tool: &str, action: Option<&str>, error: &ToolError) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push((tool.to_string(), action.map(str::to_string), error.message.clone()));
        }
    }
}

pub mod vendor {
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use axum::Router;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    pub const PROJECT_PAGES: usize = 3;
    pub const SPLIT_LINK_PAGES: usize = 3;

    #[derive(Clone, Debug)]
    pub struct RecordedRequest {
        pub method: String,
        pub path: String,
        pub query: Option<String>,
        pub headers: HeaderMap,
        pub body: String,
    }

    #[derive(Clone)]
    struct VendorState {
        base_url: String,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    /// In-process stand-in for the vendor REST API.
    pub struct MockVendor {
        pub base_url: String,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
        shutdown: Option<oneshot::Sender<()>>,
    }

    impl MockVendor {
        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }

        pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
            self.requests()
                .into_iter()
                .filter(|r| r.path.starts_with(prefix))
                .collect()
        }
    }

    impl Drop for MockVendor {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }

    pub async fn spawn() -> MockVendor {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock vendor");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}", addr);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = VendorState {
            base_url: base_url.clone(),
            requests: requests.clone(),
        };
        let app = Router::new().fallback(handle).with_state(state);
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
        });
        MockVendor {
            base_url,
            requests,
            shutdown: Some(tx),
        }
    }

    fn json(status: StatusCode, body: serde_json::Value) -> Response {
        (status, [("content-type", "application/json")], body.to_string()).into_response()
    }

    fn page_of(query: Option<&str>) -> usize {
        query
            .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("page=")))
            .and_then(|n| n.parse().ok())
            .unwrap_or(1)
    }

    async fn handle(
        State(state): State<VendorState>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        let path = uri.path().to_string();
        let query = uri.query().map(str::to_string);
        if let Ok(mut requests) = state.requests.lock() {
            requests.push(RecordedRequest {
                method: method.to_string(),
                path: path.clone(),
                query: query.clone(),
                headers: headers.clone(),
                body: String::from_utf8_lossy(&body).to_string(),
            });
        }

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        match (method.as_str(), segments.as_slice()) {
            ("GET", ["user", "organizations"]) => json(
                StatusCode::OK,
                serde_json::json!([{ "id": "org-1", "name": "Acme", "slug": "acme", "billing": "hidden" }]),
            ),
            ("GET", ["organizations", org, "projects"]) => {
                let page = page_of(query.as_deref());
                let body = serde_json::json!([
                    { "id": format!("p{}a", page), "name": format!("Page {} A", page), "slug": format!("p{}a", page), "api_key": format!("k{}a", page) },
                    { "id": format!("p{}b", page), "name": format!("Page {} B", page), "slug": format!("p{}b", page), "api_key": format!("k{}b", page) }
                ]);
                let mut response = json(StatusCode::OK, body);
                if page < PROJECT_PAGES {
                    let link = format!(
                        "<{}/organizations/{}/projects?page={}>; rel=\"next\"",
                        state.base_url,
                        org,
                        page + 1
                    );
                    if let Ok(value) = HeaderValue::from_str(&link) {
                        response.headers_mut().insert("link", value);
                    }
                }
                response
            }
            ("GET", ["projects", _, "event_fields"]) => json(
                StatusCode::OK,
                serde_json::json!([
                    { "display_id": "search", "custom": false, "filter_options": { "name": "Search" } },
                    { "display_id": "error.status", "custom": false, "filter_options": { "name": "Status" } }
                ]),
            ),
            ("GET", ["projects", project, "errors"]) => json(
                StatusCode::OK,
                serde_json::json!([{ "id": "error-1", "project_id": project }]),
            ),
            ("PATCH", ["projects", _, "errors", "locked"]) => {
                (StatusCode::BAD_REQUEST, "error is locked").into_response()
            }
            ("PATCH", ["projects", _, "errors", _]) => json(StatusCode::OK, serde_json::json!({ "id": "error-1" })),
            ("GET", ["split-links"]) => {
                let page = page_of(query.as_deref());
                let mut response = json(StatusCode::OK, serde_json::json!([{ "page": page }]));
                let last = format!("<{}/split-links?fields=a,b&page={}>; rel=\"last\"", state.base_url, SPLIT_LINK_PAGES);
                if let Ok(value) = HeaderValue::from_str(&last) {
                    response.headers_mut().append("link", value);
                }
                if page < SPLIT_LINK_PAGES {
                    let next = format!("<{}/split-links?fields=a,b&page={}>; rel=\"next\"", state.base_url, page + 1);
                    if let Ok(value) = HeaderValue::from_str(&next) {
                        response.headers_mut().append("link", value);
                    }
                }
                response
            }
            ("GET", ["fail"]) => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
            ("GET", ["empty"]) => StatusCode::NO_CONTENT.into_response(),
            _ => (StatusCode::NOT_FOUND, "not found").into_response(),
        }
    }
}
