//! Language model provider implementations for Remedy.
//!
//! All providers implement the `remedy_core::Provider` trait.
//! [`build_from_config`] selects the backend named in configuration and
//! wraps it in the bounded retry policy.

pub mod openai_compat;
pub mod retry;

use remedy_config::AppConfig;
use remedy_core::error::ProviderError;
use remedy_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryingProvider;

/// Build the configured provider, wrapped in retry/backoff.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config.api_key.clone().unwrap_or_default();

    let base: OpenAiCompatProvider = match config.provider.as_str() {
        "gemini" => match &config.api_url {
            Some(url) => OpenAiCompatProvider::new("gemini", url, api_key),
            None => OpenAiCompatProvider::gemini(api_key),
        },
        "openai" => OpenAiCompatProvider::openai(api_key),
        "openrouter" => OpenAiCompatProvider::openrouter(api_key),
        "ollama" => OpenAiCompatProvider::ollama(config.api_url.as_deref()),
        "custom" => {
            let url = config.api_url.as_deref().ok_or_else(|| {
                ProviderError::NotConfigured("custom provider requires api_url".into())
            })?;
            OpenAiCompatProvider::new("custom", url, api_key)
        }
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown provider '{other}'"
            )));
        }
    };

    tracing::debug!(provider = %config.provider, model = %config.model, "Provider configured");

    let retrying = RetryingProvider::new(Arc::new(base), config.agent.retry_attempts)
        .with_base_delay(Duration::from_millis(config.agent.retry_base_delay_ms))
        .with_attempt_timeout(Duration::from_secs(config.agent.model_timeout_secs));

    Ok(Arc::new(retrying))
}
