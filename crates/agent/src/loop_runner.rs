//! The bounded tool-using agent loop.
//!
//! A run is an explicit state machine over [`RunState`]. Each step makes one
//! model call; tool calls requested in that step are dispatched together and
//! their results appended before the next model call. The step budget
//! guarantees termination whatever the model does.

use futures::future::join_all;
use remedy_core::error::{ProviderError, ToolError};
use remedy_core::event::{DomainEvent, EventBus};
use remedy_core::message::{Conversation, Message, ToolCallRequest};
use remedy_core::provider::{ModelResponse, Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use remedy_core::run::{RunConfig, RunOutcome};
use remedy_core::tool::{ToolInvoker, ToolResult};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// `step` model rounds have completed; always below the budget.
    Running { step: u32 },
    Completed { final_text: String, steps: u32 },
    StepLimitExceeded { steps: u32 },
    Failed { error: String, steps: u32 },
}

/// What one step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    /// The model gave a final answer.
    Answered { text: String },
    /// The model asked for tools and every result has been recorded.
    ToolsRan,
    /// The model call failed or timed out.
    ModelFailed { error: String },
}

impl RunState {
    /// Initial state for a budget of `max_steps` rounds.
    pub fn start(max_steps: u32) -> Self {
        if max_steps == 0 {
            Self::StepLimitExceeded { steps: 0 }
        } else {
            Self::Running { step: 0 }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Running { .. } => "running",
            Self::Completed { .. } => "completed",
            Self::StepLimitExceeded { .. } => "step_limit_exceeded",
            Self::Failed { .. } => "failed",
        }
    }

    /// The transition function. Terminal states absorb every event.
    pub fn advance(self, event: StepEvent, max_steps: u32) -> Self {
        let Self::Running { step } = self else {
            return self;
        };
        let steps = step + 1;

        match event {
            StepEvent::Answered { text } => Self::Completed {
                final_text: text,
                steps,
            },
            StepEvent::ModelFailed { error } => Self::Failed { error, steps },
            StepEvent::ToolsRan if steps >= max_steps => Self::StepLimitExceeded { steps },
            StepEvent::ToolsRan => Self::Running { step: steps },
        }
    }

    /// Attach the transcript. A run stopped while still `Running` reports
    /// budget exhaustion at the rounds it completed.
    pub fn into_outcome(self, transcript: Conversation) -> RunOutcome {
        match self {
            Self::Completed { final_text, steps } => RunOutcome::Completed {
                final_text,
                steps,
                transcript,
            },
            Self::Failed { error, steps } => RunOutcome::Failed {
                error,
                steps,
                transcript,
            },
            Self::StepLimitExceeded { steps } | Self::Running { step: steps } => {
                RunOutcome::StepLimitExceeded { steps, transcript }
            }
        }
    }
}

/// Orchestrates model calls and tool dispatch for one run at a time.
///
/// An `AgentLoop` holds no per-run state, so one instance can serve
/// concurrent runs; each run owns its [`Conversation`].
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolInvoker>,
    event_bus: Arc<EventBus>,
    config: RunConfig,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<dyn ToolInvoker>, config: RunConfig) -> Self {
        Self {
            provider,
            tools,
            event_bus: Arc::new(EventBus::default()),
            config,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Run to a terminal state under a fresh run id.
    pub async fn run(&self, conversation: Conversation) -> RunOutcome {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.run_with_id(&run_id, conversation).await
    }

    /// Run to a terminal state. Never panics and never loops past `max_steps`.
    pub async fn run_with_id(&self, run_id: &str, mut conversation: Conversation) -> RunOutcome {
        let max_steps = self.config.max_steps;
        let tool_definitions = self.tools.definitions();
        let mut seen_ids: HashSet<String> = HashSet::new();

        info!(
            run_id,
            max_steps,
            model = %self.config.model,
            tools = tool_definitions.len(),
            "Agent run started"
        );
        self.event_bus.publish(DomainEvent::RunStarted {
            run_id: run_id.to_string(),
            max_steps,
            timestamp: chrono::Utc::now(),
        });

        let mut state = RunState::start(max_steps);

        while let RunState::Running { step } = state {
            let event = self
                .step(run_id, step + 1, &mut conversation, &tool_definitions, &mut seen_ids)
                .await;
            state = state.advance(event, max_steps);
            debug!(run_id, state = state.label(), "Run state transition");
        }

        let outcome = state.into_outcome(conversation);
        if cfg!(debug_assertions) {
            if let Err(violation) = outcome.transcript().validate_tool_links() {
                error!(run_id, ?violation, "Transcript tool links are inconsistent");
            }
        }
        match &outcome {
            RunOutcome::Completed { steps, .. } => {
                info!(run_id, steps, "Agent run completed");
            }
            RunOutcome::StepLimitExceeded { steps, transcript } => {
                warn!(
                    run_id,
                    steps,
                    tool_calls = transcript.tool_call_count(),
                    "Agent run hit its step limit"
                );
            }
            RunOutcome::Failed { error, steps, .. } => {
                warn!(run_id, steps, error = %error, "Agent run failed");
            }
        }
        self.event_bus.publish(DomainEvent::RunFinished {
            run_id: run_id.to_string(),
            outcome: outcome.kind().to_string(),
            steps: outcome.steps(),
            timestamp: chrono::Utc::now(),
        });

        outcome
    }

    /// One model round, plus tool dispatch when the model asks for tools.
    async fn step(
        &self,
        run_id: &str,
        step: u32,
        conversation: &mut Conversation,
        tool_definitions: &[ToolDefinition],
        seen_ids: &mut HashSet<String>,
    ) -> StepEvent {
        debug!(run_id, step, messages = conversation.messages.len(), "Calling model");

        let response = match self.call_model(conversation, tool_definitions).await {
            Ok(response) => response,
            Err(e) => {
                return StepEvent::ModelFailed {
                    error: e.to_string(),
                };
            }
        };

        let tokens_used = response.usage.map(|u| u.total_tokens).unwrap_or(0);
        let model = response.model.clone();

        match response.into_model_response() {
            ModelResponse::FinalAnswer { text } => {
                self.publish_response(run_id, step, model, 0, tokens_used);
                conversation.push(Message::assistant(text.clone()));
                StepEvent::Answered { text }
            }
            ModelResponse::ToolCalls { thought, mut calls } => {
                self.publish_response(run_id, step, model, calls.len(), tokens_used);
                assign_unique_ids(&mut calls, seen_ids);

                conversation.push(Message::assistant_with_tools(thought, calls.clone()));
                for result in self.dispatch(run_id, &calls).await {
                    conversation.push(Message::tool_result(
                        result.tool_call_id.clone(),
                        result.transcript_content(),
                    ));
                }
                StepEvent::ToolsRan
            }
        }
    }

    async fn call_model(
        &self,
        conversation: &Conversation,
        tool_definitions: &[ToolDefinition],
    ) -> Result<ProviderResponse, ProviderError> {
        let request = ProviderRequest {
            model: self.config.model.clone(),
            messages: conversation.messages.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            tools: tool_definitions.to_vec(),
        };

        match tokio::time::timeout(self.config.model_timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "model call exceeded {}s",
                self.config.model_timeout.as_secs()
            ))),
        }
    }

    /// Invoke every requested tool concurrently; results keep request order.
    async fn dispatch(&self, run_id: &str, calls: &[ToolCallRequest]) -> Vec<ToolResult> {
        debug!(run_id, tool_count = calls.len(), "Dispatching tool calls");
        join_all(calls.iter().map(|call| self.invoke_one(run_id, call))).await
    }

    async fn invoke_one(&self, run_id: &str, call: &ToolCallRequest) -> ToolResult {
        let start = Instant::now();
        let invocation = self.tools.invoke(&call.name, call.arguments.clone());

        let result = match tokio::time::timeout(self.config.tool_timeout, invocation).await {
            Ok(Ok(output)) => ToolResult::from_output(&call.id, output),
            Ok(Err(e)) => {
                warn!(run_id, tool = %call.name, error = %e, "Tool call failed");
                ToolResult::from_error(&call.id, &e)
            }
            Err(_) => {
                let e = ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.config.tool_timeout.as_secs(),
                };
                warn!(run_id, tool = %call.name, error = %e, "Tool call timed out");
                ToolResult::from_error(&call.id, &e)
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(run_id, tool = %call.name, ok = result.is_ok(), duration_ms, "Tool call finished");
        self.event_bus.publish(DomainEvent::ToolExecuted {
            run_id: run_id.to_string(),
            tool_name: call.name.clone(),
            success: result.is_ok(),
            duration_ms,
            timestamp: chrono::Utc::now(),
        });

        result
    }

    fn publish_response(&self, run_id: &str, step: u32, model: String, tool_calls: usize, tokens_used: u32) {
        self.event_bus.publish(DomainEvent::ResponseGenerated {
            run_id: run_id.to_string(),
            step,
            model,
            tool_calls,
            tokens_used,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Replace empty or reused call ids so every tool message answers exactly one request.
fn assign_unique_ids(calls: &mut [ToolCallRequest], seen: &mut HashSet<String>) {
    for call in calls.iter_mut() {
        if call.id.is_empty() || seen.contains(&call.id) {
            let fresh = format!("call_{}", uuid::Uuid::new_v4().simple());
            debug!(old = %call.id, new = %fresh, "Reassigned tool call id");
            call.id = fresh;
        }
        seen.insert(call.id.clone());
    }
}
