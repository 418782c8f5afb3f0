mod http_error;
mod mcp_error;
mod tool_error;

pub use http_error::HttpError;
pub use mcp_error::{ErrorCode, McpError};
pub use tool_error::{ToolError, ToolErrorKind};
