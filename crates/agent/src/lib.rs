//! The remediation agent.
//!
//! [`AgentLoop`] drives a bounded **model → tools → model** cycle as an
//! explicit state machine:
//!
//! 1. **Call the model** with the transcript and the tool schemas
//! 2. **If tool calls**: dispatch them all, append one result per call, loop
//! 3. **If a final answer**: the run is `Completed`
//! 4. **If the model call fails**: the run is `Failed`, without retry
//!
//! The run ends `StepLimitExceeded` once `max_steps` model rounds have been
//! spent on tool calls. [`RemediationHandler`] turns an error event into the
//! opening transcript of such a run.

pub mod loop_runner;
pub mod remediation;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_runner::{AgentLoop, RunState, StepEvent};
pub use remediation::{ErrorEvent, RemediationHandler, RepositoryTarget, build_prompt};

use remedy_config::AppConfig;
use remedy_core::event::EventBus;
use remedy_core::provider::Provider;
use remedy_core::tool::ToolInvoker;
use std::sync::Arc;

/// Wire a handler from configuration and already-built clients.
pub fn handler_from_config(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolInvoker>,
    event_bus: Arc<EventBus>,
) -> RemediationHandler {
    let agent = AgentLoop::new(provider, tools, config.run_config()).with_event_bus(event_bus);
    RemediationHandler::new(agent, RepositoryTarget::from_config(&config.agent))
}
