//! Turning an error-report webhook into a remediation run.
//!
//! The handler pulls the few fields it needs out of an arbitrary JSON event,
//! builds a fixed task prompt around the log message and hands it to the
//! [`AgentLoop`]. Nothing in the event is required.

use crate::loop_runner::AgentLoop;
use remedy_config::AgentConfig;
use remedy_core::message::{Conversation, Message};
use remedy_core::run::RunOutcome;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

const SYSTEM_PROMPT: &str = "You are an autonomous software maintenance agent. \
You fix runtime errors by changing code in a GitHub repository through the tools you are given. \
Make the smallest change that fixes the error and always finish by opening a pull request.";

/// The fields of an error event the prompt uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub service: Option<String>,
    pub project_id: Option<String>,
    pub log_message: Option<String>,
}

impl ErrorEvent {
    /// Extract `event_info.service`, `group_info.project_id` and
    /// `event_info.log_message`. Missing or non-string fields become `None`.
    pub fn from_value(payload: &Value) -> Self {
        Self {
            service: text_at(payload, &["event_info", "service"]),
            project_id: text_at(payload, &["group_info", "project_id"]),
            log_message: text_at(payload, &["event_info", "log_message"]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.project_id.is_none() && self.log_message.is_none()
    }
}

/// Numbers are accepted where a string is expected, since project ids often arrive as either.
fn text_at(payload: &Value, path: &[&str]) -> Option<String> {
    let value = path.iter().try_fold(payload, |v, key| v.get(key))?;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Where the faulty application's code lives.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryTarget {
    /// `owner/name`
    pub repository: String,
    pub app_dir: String,
    pub base_branch: String,
}

impl RepositoryTarget {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            repository: config.repository.clone(),
            app_dir: config.app_dir.clone(),
            base_branch: config.base_branch.clone(),
        }
    }
}

impl Default for RepositoryTarget {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// The task prompt for one event. Same event and target, same prompt.
pub fn build_prompt(event: &ErrorEvent, target: &RepositoryTarget) -> String {
    let app = &target.app_dir;
    let repo = &target.repository;
    let log = event.log_message.as_deref().unwrap_or_default();

    let mut origin = String::new();
    if let Some(service) = &event.service {
        origin.push_str(&format!(" Reporting service: {service}."));
    }
    if let Some(project) = &event.project_id {
        origin.push_str(&format!(" Project: {project}."));
    }

    format!(
        "A runtime error has occurred in the '{app}'.{origin}\n\
         \n\
         Error Log:\n\
         ---\n\
         {log}\n\
         ---\n\
         \n\
         The application code is located in the '{app}' directory of the '{repo}' GitHub repository.\n\
         \n\
         Please fix the above error by following the steps below:\n\
         1. Review the error log.\n\
         2. Determine the file that contains the error within the `{app}` directory.\n\
         3. Read the file and understand the code within the `{app}` directory (get_file_contents).\n\
         4. Create a new branch (create_branch)\n\
         5. Implement the fix in the new branch (create_or_update_file)\n\
         6. Open a Pull Request to the {base} branch (create_pull_request)\n\
         \n\
         DO NOT stop tool calling till the PR was created and do not add unnecessary comments or code changes.",
        base = target.base_branch,
    )
}

/// Runs one remediation per error event.
pub struct RemediationHandler {
    agent: AgentLoop,
    target: RepositoryTarget,
}

impl RemediationHandler {
    pub fn new(agent: AgentLoop, target: RepositoryTarget) -> Self {
        Self { agent, target }
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    pub fn target(&self) -> &RepositoryTarget {
        &self.target
    }

    /// The opening transcript for an event: system prompt, then the task.
    pub fn conversation_for(&self, event: &ErrorEvent) -> Conversation {
        let mut conversation = Conversation::new();
        conversation.push(Message::system(SYSTEM_PROMPT));
        conversation.push(Message::user(build_prompt(event, &self.target)));
        conversation
    }

    /// Run the agent for `event` and return its outcome unchanged.
    pub async fn handle(&self, event: &ErrorEvent) -> RunOutcome {
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            service = event.service.as_deref().unwrap_or("-"),
            project_id = event.project_id.as_deref().unwrap_or("-"),
            has_log = event.log_message.is_some(),
            "Remediation requested"
        );
        self.agent
            .run_with_id(&run_id, self.conversation_for(event))
            .await
    }

    /// Convenience for raw webhook payloads.
    pub async fn handle_value(&self, payload: &Value) -> RunOutcome {
        self.handle(&ErrorEvent::from_value(payload)).await
    }
}
