//! Configuration loading, validation, and management for Remedy.
//!
//! Loads configuration from `~/.remedy/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup;
//! commands that talk to the model or the tool endpoint additionally call
//! [`AppConfig::require_agent_credentials`] before doing any work.

use remedy_core::RunConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.remedy/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// LLM provider: gemini, openai, openrouter, ollama or custom
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL for the `custom` provider (OpenAI-compatible)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub todo: TodoConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    8192
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("gateway", &self.gateway)
            .field("todo", &self.todo)
            .field("logging", &self.logging)
            .finish()
    }
}

/// Agent loop and remediation-task settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Step budget per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Attempts per model call (1 = no retry)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// GitHub repository the fix goes to, `owner/name`
    #[serde(default = "default_repository")]
    pub repository: String,

    /// Directory of the application under repair
    #[serde(default = "default_app_dir")]
    pub app_dir: String,

    /// Branch pull requests target
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
}

fn default_max_steps() -> u32 {
    30
}
fn default_model_timeout() -> u64 {
    120
}
fn default_tool_timeout() -> u64 {
    60
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_base_delay() -> u64 {
    500
}
fn default_repository() -> String {
    "isala404/build-with-ai-lk-demo".into()
}
fn default_app_dir() -> String {
    "todo-app".into()
}
fn default_base_branch() -> String {
    "main".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            model_timeout_secs: default_model_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            repository: default_repository(),
            app_dir: default_app_dir(),
            base_branch: default_base_branch(),
        }
    }
}

/// Remote tool endpoint (MCP server) settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// MCP endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Header carrying the auth token
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Replace the static tool catalog with the server's `tools/list`
    #[serde(default = "default_true")]
    pub discover: bool,
}

fn default_auth_header() -> String {
    "api-key".into()
}
fn default_true() -> bool {
    true
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            auth_header: default_auth_header(),
            auth_token: None,
            discover: true,
        }
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("endpoint", &self.endpoint)
            .field("auth_header", &self.auth_header)
            .field("auth_token", &redact(&self.auth_token))
            .field("discover", &self.discover)
            .finish()
    }
}

/// Agent webhook server settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// HMAC-SHA256 secret for `X-Signature-256`. Unset = no validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_gateway_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_gateway_port(),
            webhook_secret: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("webhook_secret", &redact(&self.webhook_secret))
            .finish()
    }
}

/// To-do demo service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_todo_port")]
    pub port: u16,
}

fn default_todo_port() -> u16 {
    8000
}

impl Default for TodoConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_todo_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.remedy/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_overrides(&Self::config_dir().join("config.toml"))
    }

    /// Load from an explicit path, then apply environment overrides.
    pub fn load_with_overrides(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (usually `std::env::var`).
    ///
    /// Keys already present in the file win for the API key; everything else
    /// set in the environment replaces the file value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = ["REMEDY_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY", "OPENAI_API_KEY"]
                .iter()
                .find_map(|k| lookup(k));
        }
        if let Some(provider) = lookup("REMEDY_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("REMEDY_MODEL").or_else(|| lookup("GEMINI_MODEL")) {
            self.model = model;
        }
        if let Some(endpoint) = lookup("MCP_ENDPOINT") {
            self.tools.endpoint = Some(endpoint);
        }
        if let Some(token) = lookup("MCP_AUTH_TOKEN") {
            self.tools.auth_token = Some(token);
        }
        if let Some(secret) = lookup("REMEDY_WEBHOOK_SECRET") {
            self.gateway.webhook_secret = Some(secret);
        }
        if let Some(steps) = lookup("REMEDY_MAX_STEPS") {
            match steps.parse() {
                Ok(n) => self.agent.max_steps = n,
                Err(_) => tracing::warn!(value = %steps, "Ignoring invalid REMEDY_MAX_STEPS"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".remedy")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be greater than 0".into(),
            ));
        }
        if self.agent.retry_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "agent.retry_attempts must be at least 1".into(),
            ));
        }
        if self.gateway.port == 0 || self.todo.port == 0 {
            return Err(ConfigError::ValidationError("ports must be non-zero".into()));
        }
        if self.provider == "custom" && self.api_url.is_none() {
            return Err(ConfigError::ValidationError(
                "provider \"custom\" requires api_url".into(),
            ));
        }
        Ok(())
    }

    /// Fail fast when a run could not possibly authenticate.
    pub fn require_agent_credentials(&self) -> Result<(), ConfigError> {
        if self.provider != "ollama" && self.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingCredential(
                "model API key (set REMEDY_API_KEY or GEMINI_API_KEY)".into(),
            ));
        }
        if self.tools.endpoint.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingCredential(
                "tool endpoint (set MCP_ENDPOINT or tools.endpoint)".into(),
            ));
        }
        Ok(())
    }

    /// The per-run settings handed to the agent loop.
    ///
    /// The loop's bound on a model call covers every retry attempt plus the
    /// (capped, 30 s) backoff between them.
    pub fn run_config(&self) -> RunConfig {
        let attempts = u64::from(self.agent.retry_attempts.max(1));
        let mut run = RunConfig::new(&self.model, self.agent.max_steps);
        run.temperature = self.temperature;
        run.max_tokens = Some(self.max_tokens);
        let backoff = 30u64.saturating_mul(attempts - 1);
        run.model_timeout = Duration::from_secs(
            self.agent
                .model_timeout_secs
                .saturating_mul(attempts)
                .saturating_add(backoff),
        );
        run.tool_timeout = Duration::from_secs(self.agent.tool_timeout_secs);
        run
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            gateway: GatewayConfig::default(),
            todo: TodoConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required credential: {0}")]
    MissingCredential(String),
}
