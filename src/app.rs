use crate::config::HubConfig;
use crate::constants::server;
use crate::errors::ToolError;
use crate::managers::insight_hub::InsightHubManager;
use crate::mcp::catalog::tool_catalog;
use crate::services::cache::ResolutionCache;
use crate::services::endpoint::Endpoints;
use crate::services::error_reporter::{ErrorReporter, LogErrorReporter};
use crate::services::http::RequestExecutor;
use crate::services::insight_hub_api::{HttpInsightHubApi, InsightHubApi};
use crate::services::logger::Logger;
use crate::services::resolver::InsightHubResolver;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub config: HubConfig,
    pub endpoints: Endpoints,
    pub cache: Arc<ResolutionCache>,
    pub resolver: Arc<InsightHubResolver>,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    fn validate_tool_wiring(handlers: &HashMap<String, Arc<dyn ToolHandler>>) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint("Every tool in tool_catalog.json must have a registered handler.")
            .with_details(serde_json::json!({ "missing_tools": missing })))
    }

    /// Wires the HTTP-backed services for `config`.
    pub fn initialize(config: HubConfig) -> Result<Self, ToolError> {
        let mut logger = Logger::new(server::NAME);
        logger.set_level(config.log_level);
        let endpoints = Endpoints::resolve(config.project_api_key.as_deref(), config.endpoint.as_deref())?;
        let executor = RequestExecutor::new(&config, endpoints.api.clone(), logger.child("http"))?;
        let api: Arc<dyn InsightHubApi> = Arc::new(HttpInsightHubApi::new(executor));
        let reporter: Arc<dyn ErrorReporter> = Arc::new(LogErrorReporter::new(logger.clone()));
        Self::with_api(config, endpoints, api, reporter, logger)
    }

    /// Wires the services around an arbitrary API implementation.
    pub fn with_api(
        config: HubConfig,
        endpoints: Endpoints,
        api: Arc<dyn InsightHubApi>,
        reporter: Arc<dyn ErrorReporter>,
        logger: Logger,
    ) -> Result<Self, ToolError> {
        let cache = Arc::new(ResolutionCache::new(logger.clone()));
        let resolver = Arc::new(InsightHubResolver::new(
            api,
            cache.clone(),
            config.project_api_key.clone(),
            logger.clone(),
        ));
        let insight_hub = Arc::new(InsightHubManager::new(
            logger.clone(),
            resolver.clone(),
            endpoints.app.clone(),
        ));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert(server::TOOL_NAME.to_string(), insight_hub);
        Self::validate_tool_wiring(&handlers)?;

        let tool_executor = Arc::new(ToolExecutor::new(logger.clone(), reporter, handlers));
        Ok(Self {
            logger,
            config,
            endpoints,
            cache,
            resolver,
            tool_executor,
        })
    }

    pub fn project_scoped(&self) -> bool {
        self.resolver.project_api_key().is_some()
    }

    /// Eager resolution unless disabled by configuration.
    pub async fn warm_up(&self) -> Result<(), ToolError> {
        if self.config.skip_initialize {
            self.logger.info("Skipping eager initialization", None);
            return Ok(());
        }
        self.resolver.initialize().await
    }
}
