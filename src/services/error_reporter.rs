use crate::errors::ToolError;
use crate::services::logger::Logger;

/// Receives every error a tool call surfaces, before it reaches the caller.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, tool: &str, action: Option<&str>, error: &ToolError);
}

/// Default sink: one error record on the logger.
pub struct LogErrorReporter {
    logger: Logger,
}

impl LogErrorReporter {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("reporter"),
        }
    }
}

impl ErrorReporter for LogErrorReporter {
    fn report(&self, tool: &str, action: Option<&str>, error: &ToolError) {
        self.logger.error(
            &error.message,
            Some(&serde_json::json!({
                "tool": tool,
                "action": action,
                "kind": error.kind,
                "code": error.code,
                "details": error.details,
            })),
        );
    }
}
