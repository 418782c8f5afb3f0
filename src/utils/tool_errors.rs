use crate::errors::ToolError;
use crate::utils::suggest::closest_matches;
use serde_json::Value;

pub fn unknown_action_error(tool: &str, action: Option<&Value>, known_actions: &[&str]) -> ToolError {
    let action_value = action.and_then(|v| v.as_str()).unwrap_or("");
    let suggestions = closest_matches(action_value, known_actions, 3);
    let mut hint = format!("Use one of: {}.", known_actions.join(", "));
    if !suggestions.is_empty() {
        hint = format!("Did you mean: {}? {}", suggestions.join(", "), hint);
    }
    ToolError::invalid_params(format!("Unknown {} action: {}", tool, action_value))
        .with_hint(hint)
        .with_details(serde_json::json!({
            "known_actions": known_actions,
            "did_you_mean": suggestions,
        }))
}

/// Wraps a typed-argument decoding failure for `tool:action`.
pub fn invalid_arguments(tool: &str, action: &str, err: serde_json::Error) -> ToolError {
    ToolError::invalid_params(format!("Invalid arguments for {}:{}: {}", tool, action, err))
}
