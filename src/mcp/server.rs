//! MCP server over stdio or HTTP
//!
//! Stdio: newline-delimited JSON-RPC on stdin/stdout. HTTP: stateless
//! JSON-RPC on a single POST route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::mcp::protocol::{
    InitializeResult, JsonRpcRequest, JsonRpcResponse, McpTool, ServerCapabilities, ServerInfo,
    ToolCallResult, ToolContent, ToolsCapability, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::mcp::tool::ToolHandler;

/// MCP server dispatching to registered tool handlers.
pub struct McpServer {
    tools: Vec<Arc<dyn ToolHandler>>,
}

impl McpServer {
    pub fn new(tools: Vec<Arc<dyn ToolHandler>>) -> Self {
        Self { tools }
    }

    /// List all tools as MCP tool definitions
    pub fn list_tools(&self) -> Vec<McpTool> {
        self.tools
            .iter()
            .map(|t| McpTool {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool and return an MCP-formatted result.
    ///
    /// Tool-level errors (bad input, infrastructure failures) become an
    /// `isError` result; they never tear down the request loop.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolCallResult {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            return ToolCallResult {
                content: vec![ToolContent::Text {
                    text: format!("Tool '{}' not found", name),
                }],
                is_error: Some(true),
            };
        };

        debug!(tool = name, "MCP calling tool");
        match tool.execute(arguments).await {
            Ok(content) => ToolCallResult {
                content,
                is_error: None,
            },
            Err(e) => ToolCallResult {
                content: vec![ToolContent::Text {
                    text: format!("Error: {}", e),
                }],
                is_error: Some(true),
            },
        }
    }

    /// Handle a single JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => {
                let result = InitializeResult {
                    protocol_version: "2024-11-05".to_string(),
                    capabilities: ServerCapabilities {
                        tools: ToolsCapability {
                            list_changed: false,
                        },
                    },
                    server_info: ServerInfo {
                        name: "pylet".to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                };
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::to_value(result).unwrap(),
                ))
            }

            "notifications/initialized" => {
                info!("MCP client initialized");
                None // Notifications don't get responses
            }

            "tools/list" => {
                let tools = self.list_tools();
                info!("MCP tools/list: returning {} tools", tools.len());
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::json!({ "tools": tools }),
                ))
            }

            "tools/call" => {
                let name = request
                    .params
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(serde_json::json!({}));

                if name.is_empty() {
                    return Some(JsonRpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        "Missing 'name' parameter".to_string(),
                    ));
                }

                info!("MCP tools/call: {}", name);
                let result = self.call_tool(name, arguments).await;
                Some(JsonRpcResponse::success(
                    id,
                    serde_json::to_value(result).unwrap(),
                ))
            }

            "ping" => Some(JsonRpcResponse::success(id, serde_json::json!({}))),

            _ => {
                warn!("MCP unknown method: {}", request.method);
                // Notifications (no id) shouldn't get error responses
                if request.id.is_none() {
                    None
                } else {
                    Some(JsonRpcResponse::error(
                        id,
                        METHOD_NOT_FOUND,
                        format!("Unknown method: {}", request.method),
                    ))
                }
            }
        }
    }

    /// Run the MCP server over STDIO (stdin/stdout)
    pub async fn serve_stdio(&self) -> Result<()> {
        info!("MCP server starting on STDIO");

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            debug!("MCP received: {}", &line[..line.len().min(200)]);

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    warn!("Invalid JSON-RPC request: {}", e);
                    let err_response = JsonRpcResponse::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!("Parse error: {}", e),
                    );
                    write_response(&mut stdout, &err_response).await?;
                    continue;
                }
            };

            let response = self.handle_request(request).await;

            if let Some(resp) = response {
                write_response(&mut stdout, &resp).await?;
            }
        }

        info!("MCP server STDIO closed");
        Ok(())
    }

    /// Run the MCP server on a single HTTP POST route.
    pub async fn serve_http(self: Arc<Self>, host: &str, port: u16, path: &str) -> Result<()> {
        let route = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let app = Router::new()
            .route(&route, post(handle_http))
            .with_state(self);

        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("MCP server listening on http://{}{}", addr, route);

        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn handle_http(
    State(server): State<Arc<McpServer>>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<Value> {
    match server.handle_request(request).await {
        Some(resp) => Json(serde_json::to_value(&resp).unwrap_or(Value::Null)),
        // Notifications get an empty body
        None => Json(Value::Null),
    }
}

/// Write a JSON-RPC response to stdout (newline-delimited)
async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<()> {
    let json = serde_json::to_string(response)?;
    debug!("MCP sending: {}", &json[..json.len().min(200)]);
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
