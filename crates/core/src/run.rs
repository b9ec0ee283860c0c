//! Run configuration and terminal outcomes of an agent run.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::message::Conversation;

/// Settings fixed for the lifetime of one agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of model-invocation rounds (> 0)
    pub max_steps: u32,

    /// Model identifier passed to the provider
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Wall-clock bound on each model call
    #[serde(with = "duration_secs")]
    pub model_timeout: Duration,

    /// Wall-clock bound on each tool call
    #[serde(with = "duration_secs")]
    pub tool_timeout: Duration,
}

impl RunConfig {
    pub fn new(model: impl Into<String>, max_steps: u32) -> Self {
        Self {
            max_steps: max_steps.max(1),
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            model_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(60),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// How a run ended. Every variant carries the transcript for diagnosis.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The model emitted a final answer.
    Completed {
        final_text: String,
        steps: u32,
        transcript: Conversation,
    },
    /// The step budget ran out while the model was still calling tools.
    /// Not an error: an explicit budget-exhaustion signal.
    StepLimitExceeded { steps: u32, transcript: Conversation },
    /// A model call failed; the run ended immediately.
    Failed {
        error: String,
        steps: u32,
        transcript: Conversation,
    },
}

impl RunOutcome {
    /// Short machine-readable label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::StepLimitExceeded { .. } => "step_limit_exceeded",
            Self::Failed { .. } => "failed",
        }
    }

    /// Number of model-invocation rounds used, including the failing or final one.
    pub fn steps(&self) -> u32 {
        match self {
            Self::Completed { steps, .. }
            | Self::StepLimitExceeded { steps, .. }
            | Self::Failed { steps, .. } => *steps,
        }
    }

    pub fn transcript(&self) -> &Conversation {
        match self {
            Self::Completed { transcript, .. }
            | Self::StepLimitExceeded { transcript, .. }
            | Self::Failed { transcript, .. } => transcript,
        }
    }

    /// Final text, or a diagnostic line for the non-completed outcomes.
    pub fn summary(&self) -> String {
        match self {
            Self::Completed { final_text, .. } => final_text.clone(),
            Self::StepLimitExceeded { steps, transcript } => format!(
                "Step limit reached after {steps} steps ({} tool calls) without a final answer",
                transcript.tool_call_count()
            ),
            Self::Failed { error, steps, .. } => {
                format!("Run failed after {steps} steps: {error}")
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
