//! JSON-RPC 2.0 message shapes used by the MCP stdio transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// JSON-RPC error code for a method the receiver does not implement.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Reply the client sends to a server-initiated request.
#[derive(Debug, Serialize)]
pub struct JsonRpcReply {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcReply {
    /// `ping` gets an empty result; everything else is refused with
    /// [`METHOD_NOT_FOUND`].
    pub fn to_server_request(id: Value, method: &str) -> Self {
        if method == "ping" {
            return Self {
                jsonrpc: "2.0",
                id,
                result: Some(Value::Object(serde_json::Map::new())),
                error: None,
            };
        }
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {method}"),
            }),
        }
    }
}

/// What a line read from the server turned out to be.
#[derive(Debug)]
pub enum Incoming {
    Response(JsonRpcResponse),
    /// Server-initiated request; it expects a reply carrying the same `id`.
    ServerRequest { id: Value, method: String },
    /// Server-initiated notification; the client does not act on these.
    ServerNotification { method: String },
}

impl Incoming {
    pub fn parse(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;
        if let Some(method) = value.get("method").and_then(Value::as_str) {
            let method = method.to_string();
            return Some(match value.get("id") {
                Some(id) if !id.is_null() => Self::ServerRequest {
                    id: id.clone(),
                    method,
                },
                _ => Self::ServerNotification { method },
            });
        }
        serde_json::from_value(value).ok().map(Self::Response)
    }
}

impl JsonRpcResponse {
    pub fn id_matches(&self, id: u64) -> bool {
        self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<McpToolDef>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "mimeType", default)]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
    #[serde(other)]
    Unsupported,
}

impl ContentBlock {
    fn render(&self) -> Option<String> {
        match self {
            Self::Text { text } => Some(text.clone()),
            Self::Image { mime_type } => Some(format!("[image: {mime_type}]")),
            Self::Resource { resource } => resource
                .get("text")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .or_else(|| {
                    resource
                        .get("uri")
                        .and_then(Value::as_str)
                        .map(|uri| format!("[resource: {uri}]"))
                }),
            Self::Unsupported => None,
        }
    }
}

impl CallToolResult {
    /// Text rendering of all content blocks, newline separated.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
