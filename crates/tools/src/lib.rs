//! Remote tool access for Remedy.
//!
//! The agent never executes repository operations itself: every action is a
//! call to an MCP server (typically a GitHub MCP server) through
//! [`McpToolClient`]. The static [`github_catalog`] describes the tools a
//! remediation needs until the server's own list has been discovered.

pub mod github;
pub mod mcp;
pub mod protocol;

use remedy_config::AppConfig;
use remedy_core::error::ToolError;
use std::time::Duration;
use tracing::warn;

pub use github::github_catalog;
pub use mcp::McpToolClient;

/// Build the tool client named in configuration.
///
/// With `tools.discover` set, the server's `tools/list` replaces the static
/// catalog; a failed discovery keeps the static catalog and is logged.
/// Every exchange with the server, discovery included, is bounded by
/// `agent.tool_timeout_secs`.
pub async fn build_from_config(config: &AppConfig) -> Result<McpToolClient, ToolError> {
    let endpoint = config
        .tools
        .endpoint
        .as_deref()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ToolError::Unavailable("no tool endpoint configured".into()))?;

    let mut client = McpToolClient::new(endpoint)
        .with_timeout(Duration::from_secs(config.agent.tool_timeout_secs.max(1)))
        .with_catalog(github_catalog());
    if let Some(token) = &config.tools.auth_token {
        client = client.with_auth(config.tools.auth_header.as_str(), token.as_str());
    }

    if config.tools.discover {
        if let Err(e) = client.discover().await {
            warn!(endpoint, error = %e, "Tool discovery failed, using built-in catalog");
        }
    }

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_endpoint_is_unavailable() {
        let err = build_from_config(&AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(_)));
    }

    #[tokio::test]
    async fn failed_discovery_keeps_static_catalog() {
        let mut config = AppConfig::default();
        config.tools.endpoint = Some("http://127.0.0.1:9/mcp".into());
        config.tools.auth_token = Some("token".into());

        let client = build_from_config(&config).await.unwrap();
        assert!(client.tool_names().contains(&"create_pull_request".to_string()));
    }

    #[tokio::test]
    async fn silent_endpoint_does_not_block_startup() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = AppConfig::default();
        config.tools.endpoint = Some(format!("http://{addr}/mcp"));
        config.agent.tool_timeout_secs = 1;

        let client = tokio::time::timeout(Duration::from_secs(10), build_from_config(&config))
            .await
            .expect("startup must not wait on a silent server")
            .unwrap();
        assert_eq!(client.tool_names().len(), github_catalog().len());
    }
}
