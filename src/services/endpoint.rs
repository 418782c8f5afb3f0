//! Maps a logical subdomain (`api`, `app`) plus the configured credentials to
//! a canonical base URL.

use crate::constants::endpoint::{HUB_DOMAIN, HUB_PREFIX, STANDARD_DOMAIN};
use crate::errors::ToolError;
use url::Url;

const KNOWN_DOMAINS: &[&str] = &[HUB_DOMAIN, STANDARD_DOMAIN];

/// True when the project API key belongs to the hub deployment.
pub fn is_hub_key(project_api_key: Option<&str>) -> bool {
    project_api_key
        .map(|key| key.starts_with(HUB_PREFIX))
        .unwrap_or(false)
}

fn known_domain_for(host: &str) -> Option<&'static str> {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    KNOWN_DOMAINS.iter().copied().find(|domain| {
        host == *domain
            || host
                .strip_suffix(domain)
                .map(|rest| rest.ends_with('.'))
                .unwrap_or(false)
    })
}

/// Resolves the base URL for `subdomain`.
///
/// Without an explicit endpoint the hub or standard host family is chosen by
/// the key prefix. An explicit endpoint on a known host family is rebuilt as
/// `https://<subdomain>.<domain>`; any other host is returned untouched.
pub fn resolve_endpoint(
    subdomain: &str,
    project_api_key: Option<&str>,
    explicit: Option<&str>,
) -> Result<String, ToolError> {
    let Some(raw) = explicit else {
        let domain = if is_hub_key(project_api_key) {
            HUB_DOMAIN
        } else {
            STANDARD_DOMAIN
        };
        return Ok(format!("https://{}.{}", subdomain, domain));
    };

    let parsed = Url::parse(raw).map_err(|err| {
        ToolError::configuration("INVALID_ENDPOINT", format!("Invalid endpoint URL {}: {}", raw, err))
            .with_hint("Set INSIGHT_HUB_ENDPOINT to an absolute URL such as https://api.example.com")
    })?;

    match parsed.host_str().and_then(known_domain_for) {
        Some(domain) => Ok(format!("https://{}.{}", subdomain, domain)),
        None => Ok(raw.to_string()),
    }
}

/// API and dashboard base URLs for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api: String,
    pub app: String,
}

impl Endpoints {
    pub fn resolve(project_api_key: Option<&str>, explicit: Option<&str>) -> Result<Self, ToolError> {
        use crate::constants::endpoint::{APP_SUBDOMAIN, DEFAULT_SUBDOMAIN};
        // The dashboard never lives on a custom API host.
        let app_explicit = explicit.filter(|raw| {
            Url::parse(raw)
                .ok()
                .and_then(|u| u.host_str().and_then(known_domain_for))
                .is_some()
        });
        Ok(Self {
            api: resolve_endpoint(DEFAULT_SUBDOMAIN, project_api_key, explicit)?,
            app: resolve_endpoint(APP_SUBDOMAIN, project_api_key, app_explicit)?,
        })
    }
}
