//! MCP protocol types based on JSON-RPC 2.0.
//!
//! Incoming lines are decoded into a loose [`Envelope`] first and classified
//! afterwards, so malformed messages can still be answered with the id they
//! carried.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version.
pub const MCP_VERSION: &str = "2024-11-05";

// =============================================================================
// Envelope
// =============================================================================

/// Any JSON-RPC message, before classification.
///
/// `id` and `result` distinguish "absent" from an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub result: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub error: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Envelope classification. Exactly one applies to every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Request,
    Notification,
    Response,
    Invalid,
}

impl Envelope {
    pub fn classify(&self) -> EnvelopeKind {
        if self.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            return EnvelopeKind::Invalid;
        }
        match (&self.method, &self.id) {
            (Some(_), Some(_)) => EnvelopeKind::Request,
            (Some(_), None) => EnvelopeKind::Notification,
            (None, _) if self.result.is_some() || self.error.is_some() => EnvelopeKind::Response,
            (None, _) => EnvelopeKind::Invalid,
        }
    }

    /// The id to answer with; `null` when the message had none.
    pub fn reply_id(&self) -> Value {
        self.id.clone().unwrap_or(Value::Null)
    }
}

// =============================================================================
// Responses
// =============================================================================

/// JSON-RPC response message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a successful response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Successful response from any serializable result.
    pub fn from_result<T: Serialize>(id: Value, result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self::success(id, value),
            Err(e) => Self::error(id, JsonRpcError::internal_error(&e.to_string())),
        }
    }

    /// Create an error response.
    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes
impl JsonRpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    fn new(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }

    pub fn parse_error(msg: &str) -> Self {
        Self::new(Self::PARSE_ERROR, format!("Parse error: {}", msg))
    }

    pub fn invalid_request(msg: &str) -> Self {
        Self::new(Self::INVALID_REQUEST, format!("Invalid request: {}", msg))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Unknown tool: {}", name))
    }

    pub fn invalid_params(msg: &str) -> Self {
        Self::new(Self::INVALID_PARAMS, format!("Invalid params: {}", msg))
    }

    pub fn internal_error(msg: &str) -> Self {
        Self::new(Self::INTERNAL_ERROR, format!("Internal error: {}", msg))
    }
}

// =============================================================================
// MCP-specific types
// =============================================================================

/// Initialize request params. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: Option<String>,
    pub capabilities: Value,
    pub client_info: Option<ClientInfo>,
}

/// Client information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Initialize response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

/// Server capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    pub list_changed: bool,
}

/// Server information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "atlas-tools".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Tool definition for tools/list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Tools list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// tools/list params. The cursor is accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolsListParams {
    pub cursor: Option<String>,
}

/// Tool call request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Tool call result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ToolResultContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Create a successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Successful result holding `value` as pretty-printed JSON.
    pub fn json<T: Serialize>(value: &T) -> atlas_core::Result<Self> {
        Ok(Self::text(serde_json::to_string_pretty(value)?))
    }

    /// Create an error result; `reason` becomes the first content item.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text {
                text: reason.into(),
            }],
            is_error: true,
        }
    }

    /// Append another text item.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(ToolResultContent::Text { text: text.into() });
        self
    }

    /// First text item, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|c| match c {
            ToolResultContent::Text { text } => text.as_str(),
        })
    }
}

/// Tool result content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolResultContent {
    #[serde(rename = "text")]
    Text { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn test_classify_request() {
        let env = envelope(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
        assert_eq!(env.classify(), EnvelopeKind::Request);
    }

    #[test]
    fn test_classify_null_id_is_still_a_request() {
        let env = envelope(json!({"jsonrpc": "2.0", "id": null, "method": "ping"}));
        assert_eq!(env.id, Some(Value::Null));
        assert_eq!(env.classify(), EnvelopeKind::Request);
    }

    #[test]
    fn test_classify_notification() {
        let env = envelope(json!({"jsonrpc": "2.0", "method": "initialized"}));
        assert_eq!(env.classify(), EnvelopeKind::Notification);
        assert_eq!(env.reply_id(), Value::Null);
    }

    #[test]
    fn test_classify_response() {
        let ok = envelope(json!({"jsonrpc": "2.0", "id": 3, "result": null}));
        assert_eq!(ok.classify(), EnvelopeKind::Response);

        let err = envelope(json!({"jsonrpc": "2.0", "id": 3, "error": {"code": 1, "message": "x"}}));
        assert_eq!(err.classify(), EnvelopeKind::Response);
    }

    #[test]
    fn test_classify_invalid() {
        assert_eq!(envelope(json!({"jsonrpc": "2.0", "id": 1})).classify(), EnvelopeKind::Invalid);
        assert_eq!(envelope(json!({})).classify(), EnvelopeKind::Invalid);
        assert_eq!(
            envelope(json!({"jsonrpc": "1.0", "id": 1, "method": "ping"})).classify(),
            EnvelopeKind::Invalid
        );
    }

    #[test]
    fn test_string_id_preserved() {
        let env = envelope(json!({"jsonrpc": "2.0", "id": "abc-1", "method": "ping"}));
        let resp = JsonRpcResponse::success(env.reply_id(), json!({}));
        assert_eq!(serde_json::to_value(&resp).unwrap()["id"], "abc-1");
    }

    // =========================================================================
    // Responses
    // =========================================================================

    #[test]
    fn test_error_response_serialization() {
        let resp = JsonRpcResponse::error(json!(7), JsonRpcError::invalid_request("nope"));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["error"]["code"], -32600);
        assert_eq!(value["error"]["message"], "Invalid request: nope");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(JsonRpcError::parse_error("x").code, -32700);
        assert_eq!(JsonRpcError::method_not_found("x").code, -32601);
        assert_eq!(JsonRpcError::unknown_tool("x").code, -32601);
        assert_eq!(JsonRpcError::invalid_params("x").code, -32602);
        assert_eq!(JsonRpcError::internal_error("x").code, -32603);
    }

    #[test]
    fn test_initialize_result_shape() {
        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo::default(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["protocolVersion"], "2024-11-05");
        assert_eq!(value["capabilities"]["tools"]["listChanged"], false);
        assert_eq!(value["serverInfo"]["name"], "atlas-tools");
    }

    #[test]
    fn test_initialize_params_lenient() {
        let params: InitializeParams = serde_json::from_value(json!({})).unwrap();
        assert!(params.client_info.is_none());
    }

    #[test]
    fn test_tool_call_result_serialization() {
        let result = ToolCallResult::error("http_error: boom").with_text("{}");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "http_error: boom");
        assert_eq!(value["content"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_tool_call_result_json_is_pretty() {
        let result = ToolCallResult::json(&json!({"key": "PROJ-1"})).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.first_text(), Some("{\n  \"key\": \"PROJ-1\"\n}"));
    }

    #[test]
    fn test_tool_definition_camel_case() {
        let def = ToolDefinition {
            name: "jira_get_issue".into(),
            description: "Get".into(),
            input_schema: json!({"type": "object"}),
        };
        let value = serde_json::to_value(&def).unwrap();
        assert!(value.get("inputSchema").is_some());
    }
}
