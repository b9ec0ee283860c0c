//! MCP tool client over Streamable HTTP.
//!
//! Every JSON-RPC message is a POST to one endpoint. Replies come back either
//! as a plain JSON body or as a short `text/event-stream` carrying the
//! response; both are accepted. The session is opened lazily on first use
//! and reopened once if the server reports it expired.

use crate::protocol::{
    CallToolResult, InitializeParams, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ToolListResult, response_from_sse,
};
use async_trait::async_trait;
use remedy_core::error::ToolError;
use remedy_core::provider::ToolDefinition;
use remedy_core::tool::{ToolCatalog, ToolInvoker, ToolOutput};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SESSION_HEADER: &str = "mcp-session-id";

/// Pages of `tools/list` followed before discovery gives up.
const MAX_LIST_PAGES: usize = 20;

/// Bound on one HTTP exchange (connect, send and read) with the server.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Session {
    open: bool,
    id: Option<String>,
}

/// A [`ToolInvoker`] backed by a remote MCP server.
pub struct McpToolClient {
    endpoint: String,
    auth_header: String,
    auth_token: Option<String>,
    client: reqwest::Client,
    catalog: RwLock<ToolCatalog>,
    session: Mutex<Session>,
    next_id: AtomicU64,
}

impl McpToolClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_header: "api-key".into(),
            auth_token: None,
            client: http_client(DEFAULT_REQUEST_TIMEOUT),
            catalog: RwLock::new(ToolCatalog::new()),
            session: Mutex::new(Session::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send `token` in `header` on every request.
    pub fn with_auth(mut self, header: impl Into<String>, token: impl Into<String>) -> Self {
        self.auth_header = header.into();
        self.auth_token = Some(token.into());
        self
    }

    /// Bound every HTTP exchange, discovery included, by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// Seed the catalog used for schema exposure and name checks.
    pub fn with_catalog(mut self, catalog: ToolCatalog) -> Self {
        self.catalog = RwLock::new(catalog);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.catalog
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn knows(&self, name: &str) -> bool {
        self.catalog
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(name)
    }

    /// Replace the catalog with the server's own `tools/list`.
    ///
    /// Returns the number of tools discovered. An empty or truncated listing
    /// is an error and leaves the current catalog in place.
    pub async fn discover(&self) -> Result<usize, ToolError> {
        let mut discovered = ToolCatalog::new();
        let mut cursor: Option<String> = None;
        let mut exhausted = false;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let response = self.request("tools/list", params).await?;
            let result = into_result(response, "tools/list")?;
            let page: ToolListResult = serde_json::from_value(result).map_err(|e| {
                ToolError::Unavailable(format!("malformed tools/list result: {e}"))
            })?;

            for tool in page.tools {
                discovered.register(ToolDefinition {
                    name: tool.name,
                    description: tool.description.unwrap_or_default(),
                    parameters: tool
                        .input_schema
                        .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
                });
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    exhausted = true;
                    break;
                }
            }
        }

        if !exhausted {
            return Err(ToolError::Unavailable(format!(
                "tools/list still paging after {MAX_LIST_PAGES} pages"
            )));
        }
        if discovered.is_empty() {
            return Err(ToolError::Unavailable("tools/list returned no tools".into()));
        }

        let count = discovered.len();
        *self.catalog.write().unwrap_or_else(|e| e.into_inner()) = discovered;
        info!(endpoint = %self.endpoint, tools = count, "Discovered MCP tools");
        Ok(count)
    }

    /// Send a request, opening (or reopening) the session as needed.
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, ToolError> {
        let session_id = self.ensure_session().await?;
        match self.call(method, params.clone(), session_id.as_deref()).await {
            Err(CallError::Expired) if session_id.is_some() => {
                warn!(endpoint = %self.endpoint, "MCP session expired, reopening");
                *self.session.lock().await = Session::default();
                let session_id = self.ensure_session().await?;
                self.call(method, params, session_id.as_deref())
                    .await
                    .map_err(CallError::into_tool_error)
            }
            other => other.map_err(CallError::into_tool_error),
        }
    }

    async fn ensure_session(&self) -> Result<Option<String>, ToolError> {
        let mut session = self.session.lock().await;
        if session.open {
            return Ok(session.id.clone());
        }

        let params = serde_json::to_value(InitializeParams::default())
            .map_err(|e| ToolError::Unavailable(e.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, "initialize", Some(params));

        let response = self
            .post(&request, None)
            .await
            .map_err(CallError::into_tool_error)?;
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let reply = read_reply(response, id)
            .await
            .map_err(CallError::into_tool_error)?;
        into_result(reply, "initialize")?;

        let initialized = JsonRpcNotification::new("notifications/initialized");
        if let Err(e) = self.post(&initialized, session_id.as_deref()).await {
            // Some servers reject the notification without failing later calls
            warn!(error = %e.into_tool_error(), "initialized notification not accepted");
        }

        debug!(endpoint = %self.endpoint, session = ?session_id, "MCP session opened");
        session.open = true;
        session.id = session_id.clone();
        Ok(session_id)
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<JsonRpcResponse, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        let response = self.post(&request, session_id).await?;
        read_reply(response, id).await
    }

    async fn post(
        &self,
        body: &impl Serialize,
        session_id: Option<&str>,
    ) -> Result<reqwest::Response, CallError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(token) = &self.auth_token {
            builder = builder.header(self.auth_header.as_str(), token);
        }
        if let Some(id) = session_id {
            builder = builder.header(SESSION_HEADER, id);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND && session_id.is_some() {
            return Err(CallError::Expired);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                CallError::Transport(format!("authentication rejected ({status})"))
            }
            _ => CallError::Transport(format!("HTTP {status}: {}", truncate(&detail, 200))),
        })
    }
}

impl std::fmt::Debug for McpToolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpToolClient")
            .field("endpoint", &self.endpoint)
            .field("auth_header", &self.auth_header)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("tools", &self.tool_names())
            .finish()
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[async_trait]
impl ToolInvoker for McpToolClient {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.catalog
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .definitions()
    }

    async fn invoke(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        if !self.knows(tool_name) {
            return Err(ToolError::UnknownTool(tool_name.to_string()));
        }

        debug!(tool = tool_name, "Calling MCP tool");
        let params = json!({ "name": tool_name, "arguments": arguments });
        let response = self.request("tools/call", Some(params)).await?;

        if let Some(err) = response.error {
            return Err(ToolError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: format!("{} (code {})", err.message, err.code),
            });
        }

        let raw = response.result.unwrap_or(Value::Null);
        let result: CallToolResult =
            serde_json::from_value(raw.clone()).map_err(|e| ToolError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: format!("malformed tools/call result: {e}"),
            })?;

        let text = result.flatten();
        let output = if result.is_error {
            ToolOutput::error(text)
        } else {
            ToolOutput::ok(text)
        };
        Ok(output.with_data(raw))
    }
}

/// Failure of a single HTTP exchange.
enum CallError {
    Transport(String),
    Expired,
}

impl CallError {
    fn into_tool_error(self) -> ToolError {
        match self {
            CallError::Transport(reason) => ToolError::Unavailable(reason),
            CallError::Expired => ToolError::Unavailable("MCP session expired".into()),
        }
    }
}

async fn read_reply(response: reqwest::Response, id: u64) -> Result<JsonRpcResponse, CallError> {
    let is_stream = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"));

    let body = response
        .text()
        .await
        .map_err(|e| CallError::Transport(format!("reading reply: {e}")))?;

    let reply = if is_stream {
        response_from_sse(&body, id)
    } else {
        serde_json::from_str::<JsonRpcResponse>(&body)
            .ok()
            .filter(|r| r.answers(id))
    };

    reply.ok_or_else(|| {
        CallError::Transport(format!("no JSON-RPC response for request {id}"))
    })
}

/// The `result` of a protocol-level call, or its JSON-RPC error as unavailability.
fn into_result(response: JsonRpcResponse, method: &str) -> Result<Value, ToolError> {
    if let Some(err) = response.error {
        return Err(ToolError::Unavailable(format!(
            "{method} failed: {} (code {})",
            err.message, err.code
        )));
    }
    Ok(response.result.unwrap_or(Value::Null))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::github_catalog;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as HttpStatus, header};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Stub {
        methods: StdMutex<Vec<String>>,
        sessions_seen: StdMutex<Vec<Option<String>>>,
        keys_seen: StdMutex<Vec<Option<String>>>,
        expire_next_call: StdMutex<bool>,
        /// Replaces the paged `tools/list` answer when set
        tool_list: StdMutex<Option<Value>>,
        /// Answer `tools/call` under a different request id
        wrong_reply_id: StdMutex<bool>,
    }

    impl Stub {
        fn methods(&self) -> Vec<String> {
            self.methods.lock().unwrap().clone()
        }
    }

    async fn handle(
        State(stub): State<Arc<Stub>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Response {
        let method = body["method"].as_str().unwrap_or_default().to_string();
        stub.methods.lock().unwrap().push(method.clone());
        stub.sessions_seen.lock().unwrap().push(
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        );
        stub.keys_seen.lock().unwrap().push(
            headers
                .get("api-key")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        );
        let id = body["id"].clone();

        match method.as_str() {
            "initialize" => (
                [(SESSION_HEADER, "session-1")],
                Json(json!({
                    "jsonrpc": "2.0", "id": id,
                    "result": { "protocolVersion": "2025-03-26", "capabilities": {} }
                })),
            )
                .into_response(),
            "notifications/initialized" => HttpStatus::ACCEPTED.into_response(),
            "tools/list" => {
                let fixed = stub.tool_list.lock().unwrap().clone();
                let page = if let Some(page) = fixed {
                    page
                } else if body["params"]["cursor"] == "p2" {
                    json!({ "tools": [{ "name": "create_pull_request" }] })
                } else {
                    json!({
                        "tools": [{
                            "name": "get_file_contents",
                            "description": "Read a file",
                            "inputSchema": { "type": "object", "properties": { "path": { "type": "string" } } }
                        }],
                        "nextCursor": "p2"
                    })
                };
                Json(json!({ "jsonrpc": "2.0", "id": id, "result": page })).into_response()
            }
            "tools/call" => {
                {
                    let mut expire = stub.expire_next_call.lock().unwrap();
                    if *expire {
                        *expire = false;
                        return HttpStatus::NOT_FOUND.into_response();
                    }
                }
                if *stub.wrong_reply_id.lock().unwrap() {
                    return Json(json!({
                        "jsonrpc": "2.0", "id": 999_999,
                        "result": { "content": [{ "type": "text", "text": "someone else's reply" }] }
                    }))
                    .into_response();
                }
                match body["params"]["name"].as_str() {
                    Some("get_file_contents") => {
                        let payload = json!({
                            "jsonrpc": "2.0", "id": id,
                            "result": { "content": [{ "type": "text", "text": "def main(): pass" }] }
                        });
                        let sse = format!("event: message\ndata: {payload}\n\n");
                        ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
                    }
                    Some("create_branch") => Json(json!({
                        "jsonrpc": "2.0", "id": id,
                        "result": { "content": [{ "type": "text", "text": "Reference already exists" }], "isError": true }
                    }))
                    .into_response(),
                    _ => Json(json!({
                        "jsonrpc": "2.0", "id": id,
                        "error": { "code": -32602, "message": "Unknown tool" }
                    }))
                    .into_response(),
                }
            }
            _ => HttpStatus::BAD_REQUEST.into_response(),
        }
    }

    async fn spawn_stub() -> (String, Arc<Stub>) {
        let stub = Arc::new(Stub::default());
        let app = Router::new()
            .route("/mcp", post(handle))
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/mcp"), stub)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_network() {
        let client = McpToolClient::new("http://127.0.0.1:9/unreachable").with_catalog(github_catalog());
        let err = client.invoke("delete_repository", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(ref n) if n == "delete_repository"));
    }

    #[tokio::test]
    async fn opens_session_then_calls_tool() {
        let (url, stub) = spawn_stub().await;
        let client = McpToolClient::new(url)
            .with_auth("api-key", "secret")
            .with_catalog(github_catalog());

        let output = client
            .invoke("get_file_contents", args(json!({ "path": "todo-app/main.py" })))
            .await
            .unwrap();

        assert_eq!(output.status, remedy_core::ToolStatus::Ok);
        assert_eq!(output.output, "def main(): pass");
        assert!(output.data.is_some());
        assert_eq!(
            stub.methods(),
            vec!["initialize", "notifications/initialized", "tools/call"]
        );

        let sessions = stub.sessions_seen.lock().unwrap().clone();
        assert_eq!(sessions[0], None);
        assert_eq!(sessions[2].as_deref(), Some("session-1"));
        assert!(stub
            .keys_seen
            .lock()
            .unwrap()
            .iter()
            .all(|k| k.as_deref() == Some("secret")));
    }

    #[tokio::test]
    async fn is_error_result_becomes_error_output() {
        let (url, _stub) = spawn_stub().await;
        let client = McpToolClient::new(url).with_catalog(github_catalog());

        let output = client
            .invoke("create_branch", args(json!({ "branch": "fix" })))
            .await
            .unwrap();
        assert_eq!(output.status, remedy_core::ToolStatus::Error);
        assert_eq!(output.output, "Reference already exists");
    }

    #[tokio::test]
    async fn json_rpc_error_is_execution_failure() {
        let (url, _stub) = spawn_stub().await;
        let client = McpToolClient::new(url).with_catalog(github_catalog());

        let err = client.invoke("list_branches", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { ref tool_name, .. } if tool_name == "list_branches"));
    }

    #[tokio::test]
    async fn discovery_follows_cursor_and_replaces_catalog() {
        let (url, _stub) = spawn_stub().await;
        let client = McpToolClient::new(url).with_catalog(github_catalog());

        let count = client.discover().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            client.tool_names(),
            vec!["create_pull_request", "get_file_contents"]
        );

        let defs = client.definitions();
        let pr = defs.iter().find(|d| d.name == "create_pull_request").unwrap();
        assert_eq!(pr.parameters["type"], "object");
    }

    #[tokio::test]
    async fn expired_session_is_reopened_once() {
        let (url, stub) = spawn_stub().await;
        let client = McpToolClient::new(url).with_catalog(github_catalog());

        client.invoke("get_file_contents", Map::new()).await.unwrap();
        *stub.expire_next_call.lock().unwrap() = true;
        client.invoke("get_file_contents", Map::new()).await.unwrap();

        let initializes = stub.methods().iter().filter(|m| *m == "initialize").count();
        assert_eq!(initializes, 2);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let client = McpToolClient::new("http://127.0.0.1:9/mcp").with_catalog(github_catalog());
        let err = client.invoke("list_branches", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(_)));
    }

    #[tokio::test]
    async fn empty_discovery_keeps_catalog() {
        let (url, stub) = spawn_stub().await;
        *stub.tool_list.lock().unwrap() = Some(json!({ "tools": [] }));
        let client = McpToolClient::new(url).with_catalog(github_catalog());
        let before = client.tool_names();

        let err = client.discover().await.unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(ref m) if m.contains("no tools")));
        assert_eq!(client.tool_names(), before);
        assert_eq!(client.definitions().len(), before.len());

        let output = client.invoke("get_file_contents", Map::new()).await.unwrap();
        assert_eq!(output.output, "def main(): pass");
    }

    #[tokio::test]
    async fn endless_paging_keeps_catalog() {
        let (url, stub) = spawn_stub().await;
        *stub.tool_list.lock().unwrap() = Some(json!({
            "tools": [{ "name": "get_file_contents" }],
            "nextCursor": "again"
        }));
        let client = McpToolClient::new(url).with_catalog(github_catalog());

        let err = client.discover().await.unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(ref m) if m.contains("still paging")));
        assert!(client.tool_names().contains(&"create_pull_request".to_string()));

        let lists = stub.methods().iter().filter(|m| *m == "tools/list").count();
        assert_eq!(lists, MAX_LIST_PAGES);
    }

    #[tokio::test]
    async fn null_descriptions_are_discovered() {
        let (url, stub) = spawn_stub().await;
        *stub.tool_list.lock().unwrap() = Some(json!({
            "tools": [{ "name": "list_commits", "description": null }]
        }));
        let client = McpToolClient::new(url).with_catalog(github_catalog());

        assert_eq!(client.discover().await.unwrap(), 1);
        assert_eq!(client.definitions()[0].description, "");
    }

    #[tokio::test]
    async fn reply_for_another_request_is_rejected() {
        let (url, stub) = spawn_stub().await;
        let client = McpToolClient::new(url).with_catalog(github_catalog());
        client.invoke("get_file_contents", Map::new()).await.unwrap();

        *stub.wrong_reply_id.lock().unwrap() = true;
        let err = client.invoke("list_branches", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(ref m) if m.contains("no JSON-RPC response")));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = McpToolClient::new(format!("http://{addr}/mcp"))
            .with_timeout(Duration::from_millis(300))
            .with_catalog(github_catalog());

        let result = tokio::time::timeout(Duration::from_secs(10), client.discover())
            .await
            .expect("discovery must be bounded by the request timeout");
        assert!(matches!(result, Err(ToolError::Unavailable(_))));
        assert!(client.tool_names().contains(&"get_file_contents".to_string()));
    }

    #[test]
    fn debug_redacts_token() {
        let client = McpToolClient::new("http://127.0.0.1:9/mcp").with_auth("api-key", "hunter2");
        let shown = format!("{client:?}");
        assert!(shown.contains("[REDACTED]"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
