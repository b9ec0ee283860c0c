//! # Remedy Core
//!
//! Domain types, traits, and error definitions for the Remedy remediation
//! agent. This crate has **no framework dependencies**: it defines the model
//! that the provider, tool, agent and gateway crates implement against.
//!
//! - [`Provider`] is the language-model seam.
//! - [`ToolInvoker`] is the remote tool-endpoint seam.
//! - [`Conversation`] is the transcript of one run, [`RunOutcome`] its end.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod run;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, Message, Role, ToolCallRequest};
pub use provider::{ModelResponse, Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use run::{RunConfig, RunOutcome};
pub use tool::{ToolCatalog, ToolInvoker, ToolOutput, ToolResult, ToolStatus};
