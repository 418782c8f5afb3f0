pub mod server {
    pub const NAME: &str = "hub-mcp";
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PROTOCOL_VERSION: &str = "2024-11-05";
    pub const TOOL_NAME: &str = "insight_hub";
}

pub mod endpoint {
    /// Project API keys with this prefix belong to the hub deployment.
    pub const HUB_PREFIX: &str = "00000";
    pub const HUB_DOMAIN: &str = "insighthub.smartbear.com";
    pub const STANDARD_DOMAIN: &str = "bugsnag.com";
    pub const DEFAULT_SUBDOMAIN: &str = "api";
    pub const APP_SUBDOMAIN: &str = "app";
}

pub mod headers {
    pub const API_FLAG: &str = "X-Bugsnag-API";
    pub const API_VERSION: &str = "X-Version";
    pub const API_VERSION_VALUE: &str = "2";
    pub const AUTH_SCHEME: &str = "token";
}

pub mod cache_keys {
    pub const ORGANIZATION: &str = "insight_hub_org";
    pub const PROJECTS: &str = "insight_hub_projects";
    pub const CURRENT_PROJECT: &str = "insight_hub_current_project";
    pub const CURRENT_PROJECT_EVENT_FILTERS: &str = "insight_hub_current_project_event_filters";
    /// Read-only fallback written by older releases.
    pub const LEGACY_CURRENT_PROJECTS: &str = "insight_hub_current_projects";
    pub const PROJECT_EVENT_FILTERS_PREFIX: &str = "insight_hub_project_event_filters:";
}

pub mod filters {
    /// Event fields never offered as filters.
    pub const DENYLISTED_FIELDS: &[&str] = &["search"];
    pub const SINCE_FIELD: &str = "event.since";
    pub const BEFORE_FIELD: &str = "event.before";
}

pub mod listing {
    pub const DEFAULT_PAGE_SIZE: usize = 10;
    pub const DEFAULT_PAGE: usize = 1;
    pub const PIVOT_SUMMARY_SIZE: usize = 5;
}

pub mod env {
    pub const AUTH_TOKEN: &str = "INSIGHT_HUB_AUTH_TOKEN";
    pub const PROJECT_API_KEY: &str = "INSIGHT_HUB_PROJECT_API_KEY";
    pub const ENDPOINT: &str = "INSIGHT_HUB_ENDPOINT";
    pub const EXTRA_HEADERS: &str = "HUB_EXTRA_HEADERS";
    pub const LOG_LEVEL: &str = "HUB_LOG_LEVEL";
    pub const LOG_LEVEL_FALLBACK: &str = "LOG_LEVEL";
}
