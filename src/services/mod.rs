pub mod cache;
pub mod endpoint;
pub mod error_reporter;
pub mod filters;
pub mod http;
pub mod insight_hub_api;
pub mod logger;
pub mod resolver;
pub mod tool_executor;
