//! Message and Conversation domain types.
//!
//! A conversation is the transcript of one remediation run:
//! system instructions → task prompt → assistant turns and tool results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Unique identifier for a conversation (one per agent run).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The task author (the webhook handler)
    User,
    /// The language model
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_with_tools(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content.into());
        msg.tool_calls = calls;
        msg
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}

/// A tool call requested by the model. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique ID for this tool call (assigned by the model)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments keyed by parameter name
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Build a request from the raw JSON argument string models emit.
    ///
    /// Anything that is not a JSON object becomes an empty argument map;
    /// the remote tool then reports the missing parameters itself.
    pub fn from_raw(id: impl Into<String>, name: impl Into<String>, raw_arguments: &str) -> Self {
        let arguments = match serde_json::from_str::<serde_json::Value>(raw_arguments) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => {
                if !raw_arguments.trim().is_empty() {
                    tracing::warn!(raw = %raw_arguments, "Discarding non-object tool arguments");
                }
                serde_json::Map::new()
            }
        };
        Self::new(id, name, arguments)
    }

    /// Arguments as a JSON string, the wire form chat-completion APIs expect.
    pub fn arguments_json(&self) -> String {
        serde_json::Value::Object(self.arguments.clone()).to_string()
    }
}

/// Why a transcript violates the tool-call pairing invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptViolation {
    /// A tool message has no `tool_call_id`
    MissingToolCallId { message_index: usize },
    /// A tool message references an id no earlier assistant message issued
    UnknownToolCallId { message_index: usize, id: String },
    /// Two tool messages answer the same call
    DuplicateResponse { message_index: usize, id: String },
    /// A call never received a tool message
    Unanswered { id: String },
}

/// A conversation is an ordered sequence of messages with shared context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Total number of tool calls requested across all assistant messages.
    pub fn tool_call_count(&self) -> usize {
        self.messages.iter().map(|m| m.tool_calls.len()).sum()
    }

    /// Check that every tool message answers exactly one earlier request
    /// and every request has been answered.
    pub fn validate_tool_links(&self) -> Result<(), TranscriptViolation> {
        let mut issued: HashSet<&str> = HashSet::new();
        let mut answered: HashSet<&str> = HashSet::new();

        for (index, msg) in self.messages.iter().enumerate() {
            match msg.role {
                Role::Assistant => {
                    issued.extend(msg.tool_calls.iter().map(|c| c.id.as_str()));
                }
                Role::Tool => {
                    let Some(id) = msg.tool_call_id.as_deref() else {
                        return Err(TranscriptViolation::MissingToolCallId {
                            message_index: index,
                        });
                    };
                    if !issued.contains(id) {
                        return Err(TranscriptViolation::UnknownToolCallId {
                            message_index: index,
                            id: id.to_string(),
                        });
                    }
                    if !answered.insert(id) {
                        return Err(TranscriptViolation::DuplicateResponse {
                            message_index: index,
                            id: id.to_string(),
                        });
                    }
                }
                Role::User | Role::System => {}
            }
        }

        match issued.difference(&answered).next() {
            Some(id) => Err(TranscriptViolation::Unanswered { id: id.to_string() }),
            None => Ok(()),
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
