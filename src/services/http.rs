use crate::config::HubConfig;
use crate::constants::{headers, server};
use crate::errors::{HttpError, ToolError};
use crate::services::logger::Logger;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, LINK, USER_AGENT};
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

/// Decoded response of one call. For paginated calls `body` is the
/// concatenation of every page and `status`/`headers` come from the last page.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends authenticated JSON requests against one base URL and walks
/// `Link: <...>; rel="next"` pagination.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
    base_url: String,
    headers: HeaderMap,
    logger: Logger,
}

impl RequestExecutor {
    pub fn new(config: &HubConfig, base_url: impl Into<String>, logger: Logger) -> Result<Self, ToolError> {
        let client = Client::builder()
            .build()
            .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))?;
        let headers = headers_to_headermap(&merge_headers(&config.auth_token, &config.extra_headers))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            headers,
            logger,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        paginate: bool,
    ) -> Result<ApiResponse, ToolError> {
        let url = self.build_url(path);
        if !paginate {
            return Ok(self.send_once(method, &url, body).await?);
        }

        let mut items = Vec::new();
        let mut next = Some(url);
        let mut last = None;
        while let Some(target) = next.take() {
            let page = self.send_once(method.clone(), &target, body).await?;
            match &page.body {
                Value::Array(values) => items.extend(values.iter().cloned()),
                Value::Null => {}
                other => items.push(other.clone()),
            }
            next = page.header(LINK.as_str()).and_then(next_link);
            last = Some(page);
        }

        let (status, headers) = last
            .map(|page| (page.status, page.headers))
            .unwrap_or((200, BTreeMap::new()));
        Ok(ApiResponse {
            status,
            headers,
            body: Value::Array(items),
        })
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            return path.to_string();
        }
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send_once(&self, method: Method, url: &str, body: Option<&Value>) -> Result<ApiResponse, HttpError> {
        let parsed = url::Url::parse(url).map_err(|err| HttpError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        let mut req = self
            .client
            .request(method.clone(), parsed)
            .headers(self.headers.clone());
        if let Some(payload) = body {
            req = req.body(serde_json::to_vec(payload)?);
        }

        let started = Instant::now();
        let response = req.send().await?;
        let status = response.status();
        let response_headers = headers_to_map(response.headers());
        let text = response.text().await?;

        self.logger.debug(
            "request",
            Some(&serde_json::json!({
                "method": method.as_str(),
                "url": url,
                "status": status.as_u16(),
                "elapsed_ms": started.elapsed().as_millis() as u64,
            })),
        );

        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok(ApiResponse {
            status: status.as_u16(),
            headers: response_headers,
            body,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LinkHeader {
    url: String,
    rels: Vec<String>,
}

// `<url>` followed by its `;`-separated parameters. The URL is matched first,
// so commas inside it never split an entry.
static LINK_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^>]*)>((?:\s*;\s*[^;,<]*)*)").expect("link header regex"));

fn parse_link_header(header: &str) -> Vec<LinkHeader> {
    LINK_ENTRY
        .captures_iter(header)
        .map(|caps| {
            let url = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            let rels = caps
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or("")
                .split(';')
                .filter_map(|param| {
                    let (key, value) = param.split_once('=')?;
                    key.trim().eq_ignore_ascii_case("rel").then(|| value.trim().trim_matches('"'))
                })
                .flat_map(|value| value.split_whitespace().map(|rel| rel.to_ascii_lowercase()))
                .collect();
            LinkHeader { url, rels }
        })
        .collect()
}

/// URL of the `rel="next"` entry, taken verbatim.
pub fn next_link(header: &str) -> Option<String> {
    parse_link_header(header)
        .into_iter()
        .find(|link| link.rels.iter().any(|rel| rel == "next"))
        .map(|link| link.url)
}

/// Standard vendor headers plus configured extras. Extras never replace the
/// credential.
fn merge_headers(auth_token: &str, extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    merged.insert(
        USER_AGENT.as_str().to_string(),
        format!("{}/{}", server::NAME, server::VERSION),
    );
    merged.insert(CONTENT_TYPE.as_str().to_string(), "application/json".to_string());
    merged.insert(headers::API_FLAG.to_ascii_lowercase(), "true".to_string());
    merged.insert(
        headers::API_VERSION.to_ascii_lowercase(),
        headers::API_VERSION_VALUE.to_string(),
    );
    for (name, value) in extra {
        merged.insert(name.to_ascii_lowercase(), value.clone());
    }
    merged.insert(
        AUTHORIZATION.as_str().to_string(),
        format!("{} {}", headers::AUTH_SCHEME, auth_token),
    );
    merged
}

fn headers_to_headermap(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ToolError> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| HttpError::InvalidHeader { name: key.clone() })?;
        let val = HeaderValue::from_str(value)
            .map_err(|_| HttpError::InvalidHeader { name: key.clone() })?;
        map.insert(name, val);
    }
    Ok(map)
}

/// Lowercased header names to values. Repeated fields are joined with `", "`.
fn headers_to_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in headers {
        let Ok(text) = value.to_str() else {
            continue;
        };
        map.entry(key.as_str().to_string())
            .and_modify(|joined| {
                joined.push_str(", ");
                joined.push_str(text);
            })
            .or_insert_with(|| text.to_string());
    }
    map
}
