//! Shared test helpers: scripted providers and a mock tool endpoint.

use async_trait::async_trait;
use remedy_core::error::{ProviderError, ToolError};
use remedy_core::message::{Message, ToolCallRequest};
use remedy_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
use remedy_core::tool::{ToolInvoker, ToolOutput, ToolStatus};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A mock provider that returns a sequence of scripted responses.
///
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    call_count: Mutex<usize>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        let response = responses[*count].clone();
        *count += 1;
        Ok(response)
    }
}

/// Requests the same tool on every call, forever.
pub struct AlwaysToolsProvider {
    tool: String,
    call_count: Mutex<usize>,
}

impl AlwaysToolsProvider {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.into(),
            call_count: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Provider for AlwaysToolsProvider {
    fn name(&self) -> &str {
        "always_tools"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        let call = ToolCallRequest::from_raw(format!("call_{}", *count), &self.tool, "{}");
        Ok(make_tool_call_response(vec![call], "one more look"))
    }
}

/// Requests a tool `succeed_for` times, then fails with a 503.
pub struct FailingAfterProvider {
    inner: AlwaysToolsProvider,
    succeed_for: usize,
}

impl FailingAfterProvider {
    pub fn new(succeed_for: usize, tool: &str) -> Self {
        Self {
            inner: AlwaysToolsProvider::new(tool),
            succeed_for,
        }
    }

    pub fn call_count(&self) -> usize {
        self.inner.call_count()
    }
}

#[async_trait]
impl Provider for FailingAfterProvider {
    fn name(&self) -> &str {
        "failing_after"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if self.inner.call_count() >= self.succeed_for {
            *self.inner.call_count.lock().unwrap() += 1;
            return Err(ProviderError::ApiError {
                status_code: 503,
                message: "model overloaded".into(),
            });
        }
        self.inner.complete(request).await
    }
}

/// Never answers.
pub struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ProviderError::Timeout("never".into()))
    }
}

/// A tool endpoint that knows a fixed set of names and echoes each call.
pub struct MockToolInvoker {
    names: Vec<String>,
    invocations: Mutex<Vec<String>>,
    failure: Option<ToolError>,
    reply: Option<(ToolStatus, String)>,
    delay: Option<Duration>,
    tool_delays: HashMap<String, Duration>,
}

impl MockToolInvoker {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            invocations: Mutex::new(Vec::new()),
            failure: None,
            reply: None,
            delay: None,
            tool_delays: HashMap::new(),
        }
    }

    pub fn github() -> Self {
        Self::new(&[
            "get_file_contents",
            "list_branches",
            "create_branch",
            "create_or_update_file",
            "create_pull_request",
        ])
    }

    pub fn failing_with(mut self, error: ToolError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn responding(mut self, status: ToolStatus, output: &str) -> Self {
        self.reply = Some((status, output.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay only calls to `name`, overriding [`Self::with_delay`].
    pub fn with_tool_delay(mut self, name: &str, delay: Duration) -> Self {
        self.tool_delays.insert(name.to_string(), delay);
        self
    }

    /// Names of the tools actually invoked (unknown names excluded).
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolInvoker for MockToolInvoker {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.names
            .iter()
            .map(|name| ToolDefinition {
                name: name.clone(),
                description: format!("{name} tool"),
                parameters: serde_json::json!({ "type": "object" }),
            })
            .collect()
    }

    async fn invoke(
        &self,
        tool_name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<ToolOutput, ToolError> {
        if !self.names.iter().any(|n| n == tool_name) {
            return Err(ToolError::UnknownTool(tool_name.to_string()));
        }
        self.invocations.lock().unwrap().push(tool_name.to_string());

        if let Some(delay) = self.tool_delays.get(tool_name).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(match &self.reply {
            Some((ToolStatus::Error, text)) => ToolOutput::error(text.clone()),
            Some((ToolStatus::Ok, text)) => ToolOutput::ok(text.clone()),
            None => ToolOutput::ok(format!(
                "{tool_name} ok: {}",
                serde_json::Value::Object(arguments)
            )),
        })
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<ToolCallRequest>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools(thought, tool_calls),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// A tool call with id `call_<name>`.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::new(
        format!("call_{name}"),
        name,
        args.as_object().cloned().unwrap_or_default(),
    )
}
