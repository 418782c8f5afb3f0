use crate::app::App;
use crate::constants::server;
use crate::errors::{ErrorCode, McpError, ToolError};
use crate::mcp::catalog::{list_tools, validate_tool_args};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

const EVENT_RESOURCE_PREFIX: &str = "insighthub://event/";

pub struct McpServer {
    app: Arc<App>,
}

impl McpServer {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": server::PROTOCOL_VERSION,
            "capabilities": {"tools": {}, "resources": {}},
            "serverInfo": {"name": server::NAME, "version": server::VERSION},
        })
    }

    fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": list_tools(self.app.project_scoped()) })
    }

    fn handle_resource_templates_list(&self) -> Value {
        serde_json::json!({
            "resourceTemplates": [{
                "uriTemplate": format!("{}{{id}}", EVENT_RESOURCE_PREFIX),
                "name": "insight_hub_event",
                "description": "An event looked up by ID across every project.",
                "mimeType": "application/json",
            }]
        })
    }

    async fn handle_tools_call(&self, name: &str, args: Value) -> Result<Value, McpError> {
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        if let Err(err) = validate_tool_args(name, &args) {
            let action = args.get("action").and_then(|v| v.as_str());
            let rejection = ToolError::invalid_params(err.message.clone());
            self.app.tool_executor.report(name, action, &rejection);
            return Err(err);
        }
        let result = self
            .app
            .tool_executor
            .execute(name, args)
            .await
            .map_err(|err| McpError::from_tool_error(name, &err))?;
        Ok(serde_json::json!({
            "content": [{ "type": "text", "text": render_text(&result) }]
        }))
    }

    async fn handle_resource_read(&self, params: &Value) -> Result<Value, McpError> {
        let uri = params.get("uri").and_then(|v| v.as_str()).unwrap_or("");
        let event_id = uri
            .strip_prefix(EVENT_RESOURCE_PREFIX)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| McpError::new(ErrorCode::InvalidParams, format!("Unknown resource: {}", uri)))?;
        let args = serde_json::json!({ "action": "get_event", "event_id": event_id });
        let result = self
            .app
            .tool_executor
            .execute(server::TOOL_NAME, args)
            .await
            .map_err(|err| McpError::from_tool_error(server::TOOL_NAME, &err))?;
        Ok(serde_json::json!({
            "contents": [{ "uri": uri, "mimeType": "application/json", "text": render_text(&result) }]
        }))
    }

    /// Answers one request; notifications yield `None`.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone()?;
        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => Ok(self.handle_tools_list()),
            "resources/list" => Ok(serde_json::json!({ "resources": [] })),
            "resources/templates/list" => Ok(self.handle_resource_templates_list()),
            "resources/read" => self.handle_resource_read(&request.params).await,
            "tools/call" => {
                let name = request.params.get("name").and_then(|v| v.as_str()).unwrap_or("");
                if name.is_empty() {
                    Err(McpError::new(ErrorCode::InvalidParams, "Missing tool name"))
                } else {
                    let args = request.params.get("arguments").cloned().unwrap_or(Value::Null);
                    self.handle_tools_call(name, args).await
                }
            }
            _ => Err(McpError::new(ErrorCode::MethodNotFound, "Method not found")),
        };
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::failure(id, err.code.as_i32(), err.message),
        })
    }

    /// Parses one line of input; returns the serialized response, if any.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let response = match serde_json::from_str::<Value>(trimmed) {
            Err(_) => Some(JsonRpcResponse::failure(
                Value::Null,
                ErrorCode::ParseError.as_i32(),
                "Parse error".to_string(),
            )),
            Ok(parsed) => match serde_json::from_value::<JsonRpcRequest>(parsed) {
                Ok(request) => self.handle_request(request).await,
                Err(_) => Some(JsonRpcResponse::failure(
                    Value::Null,
                    ErrorCode::InvalidRequest.as_i32(),
                    "Invalid request".to_string(),
                )),
            },
        };
        response.and_then(|r| serde_json::to_string(&r).ok())
    }

    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ToolError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut writer = BufWriter::new(writer);
        while let Some(line) = lines.next_line().await? {
            if let Some(payload) = self.handle_line(&line).await {
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    pub async fn run_stdio(&self) -> Result<(), ToolError> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}

fn render_text(result: &Value) -> String {
    match result {
        Value::String(text) => text.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
