use crate::errors::{ErrorCode, McpError};
use crate::utils::suggest::closest_matches;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).unwrap_or_default()
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    TOOL_CATALOG
        .iter()
        .filter_map(|tool| {
            JSONSchema::compile(&tool.input_schema)
                .ok()
                .map(|schema| (tool.name.clone(), schema))
        })
        .collect()
});

/// Actions hidden from the listing when the server is scoped to one project.
const UNSCOPED_ONLY_ACTIONS: &[&str] = &["list_projects"];

pub fn tool_catalog() -> &'static Vec<ToolDef> {
    &TOOL_CATALOG
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_CATALOG.iter().find(|tool| tool.name == name)
}

/// Tool definitions as advertised by `tools/list`.
pub fn list_tools(project_scoped: bool) -> Vec<ToolDef> {
    TOOL_CATALOG
        .iter()
        .map(|tool| {
            let mut tool = tool.clone();
            if project_scoped {
                if let Some(actions) = tool
                    .input_schema
                    .pointer_mut("/properties/action/enum")
                    .and_then(|v| v.as_array_mut())
                {
                    actions.retain(|a| {
                        a.as_str()
                            .map(|name| !UNSCOPED_ONLY_ACTIONS.contains(&name))
                            .unwrap_or(true)
                    });
                }
            }
            tool
        })
        .collect()
}

pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), McpError> {
    let (Some(tool), Some(schema)) = (tool_by_name(tool_name), TOOL_VALIDATORS.get(tool_name)) else {
        return Ok(());
    };
    if let Err(errors) = schema.validate(args) {
        let message = format_schema_errors(tool_name, args, errors, &tool.input_schema);
        return Err(McpError::new(ErrorCode::InvalidParams, message));
    }
    Ok(())
}

fn format_schema_errors(
    tool_name: &str,
    args: &Value,
    errors: jsonschema::ErrorIterator,
    schema: &Value,
) -> String {
    let header = match args.get("action").and_then(|v| v.as_str()) {
        Some(action) => format!("Invalid arguments for {}:{}", tool_name, action),
        None => format!("Invalid arguments for {}", tool_name),
    };
    let known_props: Vec<String> = schema
        .get("properties")
        .and_then(|v| v.as_object())
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();
    let known_refs: Vec<&str> = known_props.iter().map(String::as_str).collect();

    let mut lines = vec![header];
    let mut did_you_means = Vec::new();
    for err in errors.take(10) {
        let path = err.instance_path.to_string();
        let path = if path.is_empty() { "(root)".to_string() } else { path };
        match &err.kind {
            jsonschema::error::ValidationErrorKind::AdditionalProperties { unexpected } => {
                for unknown in unexpected {
                    lines.push(format!("- {}: unknown field '{}'", path, unknown));
                    let suggestions = closest_matches(unknown, &known_refs, 3);
                    if !suggestions.is_empty() {
                        did_you_means.push(format!("field '{}': {}", unknown, suggestions.join(", ")));
                    }
                }
            }
            jsonschema::error::ValidationErrorKind::Enum { options } => {
                let allowed: Vec<String> = options
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                lines.push(format!("- {}: expected one of {}", path, allowed.join(", ")));
                let received = args.pointer(&path).and_then(|v| v.as_str()).unwrap_or("");
                let allowed_refs: Vec<&str> = allowed.iter().map(String::as_str).collect();
                let suggestions = closest_matches(received, &allowed_refs, 3);
                if !suggestions.is_empty() {
                    did_you_means.push(format!("{}: {}", path, suggestions.join(", ")));
                }
            }
            jsonschema::error::ValidationErrorKind::Required { property } => {
                let prop = property
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| property.to_string());
                lines.push(format!("- {}: missing required field '{}'", path, prop));
            }
            _ => lines.push(format!("- {}: {}", path, err)),
        }
    }
    if !did_you_means.is_empty() {
        lines.push(format!("Did you mean: {}", did_you_means.join(" | ")));
    }
    lines.join("\n")
}
