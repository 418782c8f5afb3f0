use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::errors::ToolError;
use crate::services::error_reporter::ErrorReporter;
use crate::services::logger::Logger;
use crate::utils::suggest::closest_matches;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, ToolError>;
}

#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    reporter: Arc<dyn ErrorReporter>,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(
        logger: Logger,
        reporter: Arc<dyn ErrorReporter>,
        handlers: HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Self {
        Self {
            logger: logger.child("executor"),
            reporter,
            handlers: Arc::new(handlers),
        }
    }

    pub fn has_tool(&self, tool: &str) -> bool {
        self.handlers.contains_key(tool)
    }

    /// Runs `tool`. Failures are passed to the reporter and then returned.
    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let Some(handler) = self.handlers.get(tool) else {
            let known: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
            let suggestions = closest_matches(tool, &known, 3);
            let mut err = ToolError::invalid_params(format!("Unknown tool: {}", tool));
            if !suggestions.is_empty() {
                err = err.with_hint(format!("Did you mean: {}", suggestions.join(", ")));
            }
            self.report(tool, action_of(&args), &err);
            return Err(err);
        };

        let action = action_of(&args).map(str::to_string);
        let trace_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        self.logger.debug(
            tool,
            Some(&serde_json::json!({ "action": action, "trace_id": trace_id })),
        );

        let result = handler.handle(args).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => self.logger.debug(
                "ok",
                Some(&serde_json::json!({ "tool": tool, "trace_id": trace_id, "duration_ms": duration_ms })),
            ),
            Err(err) => self.report(tool, action.as_deref(), err),
        }
        result
    }

    /// Hands a failure raised outside `execute` (such as argument schema
    /// rejection) to the reporter.
    pub fn report(&self, tool: &str, action: Option<&str>, err: &ToolError) {
        self.reporter.report(tool, action, err);
    }
}

fn action_of(args: &Value) -> Option<&str> {
    args.get("action").and_then(|v| v.as_str())
}
