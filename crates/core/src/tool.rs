//! Tool abstractions: how the agent acts on the outside world.
//!
//! Tools live behind a remote endpoint; the agent only sees a
//! [`ToolInvoker`] and the schemas in its [`ToolCatalog`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Whether a tool call succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// What a tool invocation produced, before it is tied to a call id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub status: ToolStatus,

    /// Text form of the output (what the model reads)
    pub output: String,

    /// Optional structured payload as returned by the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Ok,
            output: output.into(),
            data: None,
        }
    }

    pub fn error(output: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            output: output.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The result of one tool call, owned by the agent loop once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result answers
    pub tool_call_id: String,

    pub status: ToolStatus,

    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn from_output(tool_call_id: impl Into<String>, output: ToolOutput) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            status: output.status,
            output: output.output,
            data: output.data,
        }
    }

    /// An error result describing why the call could not run.
    pub fn from_error(tool_call_id: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            status: ToolStatus::Error,
            output: error.to_string(),
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }

    /// The content recorded in the transcript's tool message.
    pub fn transcript_content(&self) -> String {
        match self.status {
            ToolStatus::Ok => self.output.clone(),
            ToolStatus::Error => format!("Error: {}", self.output),
        }
    }
}

/// Client for a tool-execution endpoint.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Schemas of the tools the model may call.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Invoke a tool by name.
    ///
    /// Names outside the catalog fail with [`ToolError::UnknownTool`] before
    /// anything is sent to the endpoint.
    async fn invoke(
        &self,
        tool_name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> std::result::Result<ToolOutput, ToolError>;
}

/// The set of tool names an endpoint is known to expose.
///
/// Ordered by name so the schemas sent to the model are stable across runs.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, definition: ToolDefinition) {
        self.tools.insert(definition.name.clone(), definition);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().cloned().collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
