//! JSON-RPC 2.0 and MCP wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "2025-03-26";

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Servers may echo the id as a number or a string
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn answers(&self, id: u64) -> bool {
        match &self.id {
            Value::Number(n) => n.as_u64() == Some(id),
            Value::String(s) => s.parse::<u64>().ok() == Some(id),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: &'static str,
    pub capabilities: Value,
    pub client_info: ClientInfo,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            capabilities: serde_json::json!({}),
            client_info: ClientInfo {
                name: "remedy",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListResult {
    #[serde(default)]
    pub tools: Vec<ToolInfo>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "mimeType", default)]
        mime_type: String,
    },
    Resource {
        resource: EmbeddedResource,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedResource {
    pub uri: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl CallToolResult {
    /// Text the model reads: text items verbatim, placeholders for the rest.
    pub fn flatten(&self) -> String {
        self.content
            .iter()
            .map(|item| match item {
                ContentItem::Text { text } => text.clone(),
                ContentItem::Image { mime_type } => format!("[image: {mime_type}]"),
                ContentItem::Resource { resource } => match &resource.text {
                    Some(text) => format!("[{}]\n{}", resource.uri, text),
                    None => format!("[resource: {}]", resource.uri),
                },
                ContentItem::Unsupported => "[unsupported content]".into(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Find the JSON-RPC response for `id` in a `text/event-stream` body.
///
/// Multi-line `data:` fields are joined per the SSE rules; events that are
/// not JSON-RPC responses (notifications, pings) are skipped.
pub fn response_from_sse(body: &str, id: u64) -> Option<JsonRpcResponse> {
    let mut data = String::new();

    let take = |data: &mut String| -> Option<JsonRpcResponse> {
        if data.is_empty() {
            return None;
        }
        let parsed = serde_json::from_str::<JsonRpcResponse>(data)
            .ok()
            .filter(|r| r.answers(id));
        data.clear();
        parsed
    };

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if let Some(response) = take(&mut data) {
                return Some(response);
            }
            continue;
        }
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    // Stream ended without a trailing blank line
    take(&mut data)
}
