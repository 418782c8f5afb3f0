use crate::constants::env;
use crate::errors::ToolError;
use crate::services::logger::LogLevel;
use std::collections::BTreeMap;

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    pub auth_token: String,
    pub project_api_key: Option<String>,
    pub endpoint: Option<String>,
    pub extra_headers: BTreeMap<String, String>,
    pub log_level: LogLevel,
    pub skip_initialize: bool,
}

impl HubConfig {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            project_api_key: None,
            endpoint: None,
            extra_headers: BTreeMap::new(),
            log_level: LogLevel::Info,
            skip_initialize: false,
        }
    }

    pub fn from_env() -> Result<Self, ToolError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ToolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let auth_token = read(env::AUTH_TOKEN).ok_or_else(|| {
            ToolError::configuration("MISSING_AUTH_TOKEN", format!("{} is required", env::AUTH_TOKEN))
                .with_hint("Create a personal auth token in the dashboard settings and export it.")
        })?;

        let extra_headers = match read(env::EXTRA_HEADERS) {
            Some(raw) => parse_header_list(&raw)?,
            None => BTreeMap::new(),
        };

        let log_level = read(env::LOG_LEVEL)
            .or_else(|| read(env::LOG_LEVEL_FALLBACK))
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(LogLevel::Info);

        Ok(Self {
            auth_token,
            project_api_key: read(env::PROJECT_API_KEY),
            endpoint: read(env::ENDPOINT),
            extra_headers,
            log_level,
            skip_initialize: false,
        })
    }
}

/// Parses `name=value,name=value`. Empty segments are skipped.
pub fn parse_header_list(raw: &str) -> Result<BTreeMap<String, String>, ToolError> {
    let mut out = BTreeMap::new();
    for segment in raw.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (name, value) = segment.split_once('=').ok_or_else(|| {
            ToolError::configuration(
                "INVALID_HEADER",
                format!("{}: expected name=value, got {}", env::EXTRA_HEADERS, segment),
            )
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ToolError::configuration(
                "INVALID_HEADER",
                format!("{}: header name must not be empty", env::EXTRA_HEADERS),
            ));
        }
        out.insert(name.to_string(), value.trim().to_string());
    }
    Ok(out)
}
