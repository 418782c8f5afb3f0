use super::ToolError;
use thiserror::Error;

/// Failures of a single HTTP exchange with the vendor API.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid request url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<HttpError> for ToolError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Status { status, body } => ToolError::upstream(status, body),
            HttpError::InvalidUrl { .. } => ToolError::configuration("INVALID_ENDPOINT", err.to_string()),
            HttpError::InvalidHeader { .. } => ToolError::configuration("INVALID_HEADER", err.to_string()),
            HttpError::Transport(ref inner) => {
                let mut out = ToolError::new(
                    super::ToolErrorKind::Upstream,
                    "UPSTREAM_TRANSPORT",
                    err.to_string(),
                );
                out.retryable = inner.is_timeout() || inner.is_connect();
                out
            }
            HttpError::Decode(_) => ToolError::new(
                super::ToolErrorKind::Upstream,
                "UPSTREAM_DECODE",
                err.to_string(),
            ),
        }
    }
}
