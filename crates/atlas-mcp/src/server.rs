//! MCP server implementation.
//!
//! Messages are handled one at a time, so responses leave in the order the
//! requests arrived. The server keeps no per-session state: `initialize` may
//! be sent any number of times.

use std::sync::Arc;

use atlas_core::{Context, Error, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::handlers;
use crate::protocol::{
    Envelope, EnvelopeKind, InitializeParams, InitializeResult, JsonRpcError, JsonRpcResponse,
    ServerCapabilities, ServerInfo, ToolCallParams, ToolsListParams, ToolsListResult, MCP_VERSION,
};
use crate::registry::{ToolFilter, ToolRegistry};
use crate::transport::LineTransport;

/// MCP server for atlas-tools.
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    filter: ToolFilter,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: ToolRegistry, filter: ToolFilter) -> Self {
        Self {
            registry: Arc::new(registry),
            filter,
            info: ServerInfo::default(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn filter(&self) -> &ToolFilter {
        &self.filter
    }

    /// Run the read loop until EOF, a write failure or cancellation of `ctx`.
    ///
    /// EOF is a clean shutdown. Cancellation returns the cancellation cause.
    pub async fn run(&self, ctx: &Context, transport: &mut LineTransport) -> Result<()> {
        info!(
            tools = self.registry.len(),
            read_only = self.filter.read_only(),
            "Starting MCP server"
        );

        loop {
            let line = tokio::select! {
                biased;
                cause = ctx.done() => {
                    info!("MCP server cancelled");
                    return Err(cause);
                }
                line = transport.read_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("EOF received, shutting down");
                    return Ok(());
                }
                Err(e) => {
                    error!(error = %e, "Failed to read from transport");
                    return Err(Error::Transport(e.to_string()));
                }
            };

            if let Some(response) = self.handle_line(ctx, &line).await {
                if let Err(e) = transport.write_line(&response).await {
                    error!(error = %e, "Failed to write response");
                    return Err(Error::Transport(e.to_string()));
                }
            }
        }
    }

    /// Handle one input line; the serialized response, if one is due.
    pub async fn handle_line(&self, ctx: &Context, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle_value(ctx, value).await?,
            Err(e) => {
                warn!(error = %e, "Unparseable message");
                JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error(&e.to_string()))
            }
        };
        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                error!(error = %e, "Failed to serialize response");
                let fallback = JsonRpcResponse::error(
                    response.id,
                    JsonRpcError::internal_error("response could not be serialized"),
                );
                serde_json::to_string(&fallback).ok()
            }
        }
    }

    /// Handle one decoded message.
    pub async fn handle_value(&self, ctx: &Context, value: Value) -> Option<JsonRpcResponse> {
        let raw_id = value.get("id").cloned().unwrap_or(Value::Null);
        let envelope: Envelope = match value {
            Value::Object(_) => match serde_json::from_value(value) {
                Ok(envelope) => envelope,
                Err(e) => {
                    return Some(JsonRpcResponse::error(
                        raw_id,
                        JsonRpcError::invalid_request(&e.to_string()),
                    ))
                }
            },
            _ => {
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::invalid_request("message must be a JSON object"),
                ))
            }
        };

        match envelope.classify() {
            EnvelopeKind::Request => Some(self.handle_request(ctx, envelope).await),
            EnvelopeKind::Notification => {
                self.handle_notification(envelope.method.as_deref().unwrap_or_default());
                None
            }
            EnvelopeKind::Response => {
                debug!(id = %envelope.reply_id(), "Dropping response from client");
                None
            }
            EnvelopeKind::Invalid => {
                let reason = if envelope.jsonrpc.as_deref() != Some(crate::protocol::JSONRPC_VERSION) {
                    "jsonrpc must be \"2.0\""
                } else {
                    "not a request, notification or response"
                };
                warn!(reason, "Invalid envelope");
                Some(JsonRpcResponse::error(
                    envelope.reply_id(),
                    JsonRpcError::invalid_request(reason),
                ))
            }
        }
    }

    /// Handle a JSON-RPC request.
    async fn handle_request(&self, ctx: &Context, req: Envelope) -> JsonRpcResponse {
        let id = req.reply_id();
        let method = req.method.as_deref().unwrap_or_default();
        debug!(method, id = %id, "Handling request");

        match method {
            "initialize" => self.handle_initialize(id, req.params),
            "tools/list" => self.handle_tools_list(id, req.params),
            "tools/call" => self.handle_tools_call(ctx, id, req.params).await,
            "ping" => JsonRpcResponse::success(id, json!({})),
            method => {
                warn!(method, "Unknown method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(method))
            }
        }
    }

    /// Handle notifications (no response).
    fn handle_notification(&self, method: &str) {
        match method {
            "initialized" | "notifications/initialized" => {
                info!("Client initialized");
            }
            "notifications/cancelled" => {
                debug!("Request cancelled by client");
            }
            _ => {
                debug!(method, "Ignoring notification");
            }
        }
    }

    fn handle_initialize(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();
        match &params.client_info {
            Some(client) => info!(
                client = %client.name,
                client_version = %client.version,
                protocol = params.protocol_version.as_deref().unwrap_or("unknown"),
                "Client connected"
            ),
            None => info!("Client connected"),
        }

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: self.info.clone(),
        };
        JsonRpcResponse::from_result(id, &result)
    }

    fn handle_tools_list(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolsListParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();
        if let Some(cursor) = &params.cursor {
            debug!(cursor = %cursor, "Ignoring tools/list cursor");
        }
        let result = ToolsListResult {
            tools: self.registry.list(&self.filter),
            next_cursor: None,
        };
        JsonRpcResponse::from_result(id, &result)
    }

    async fn handle_tools_call(&self, ctx: &Context, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p @ Value::Object(_)) => p,
            Some(_) => {
                return JsonRpcResponse::error(id, JsonRpcError::invalid_params("params must be an object"))
            }
            None => return JsonRpcResponse::error(id, JsonRpcError::invalid_params("Missing params")),
        };
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return JsonRpcResponse::error(id, JsonRpcError::invalid_params(&e.to_string())),
        };
        let args = match params.arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("arguments must be an object"),
                )
            }
        };

        let tool = match self.registry.get(&params.name) {
            Some(tool) if self.filter.is_allowed(tool.name()) => tool,
            _ => {
                warn!(tool = %params.name, "Unknown tool");
                return JsonRpcResponse::error(id, JsonRpcError::unknown_tool(&params.name));
            }
        };
        if self.filter.read_only() && tool.is_write() {
            warn!(tool = %params.name, "Write tool called in read-only mode");
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request("write operations are disabled in read-only mode"),
            );
        }

        info!(tool = %params.name, "Calling tool");
        let result = handlers::invoke(ctx, tool, args).await;
        JsonRpcResponse::from_result(id, &result)
    }
}
