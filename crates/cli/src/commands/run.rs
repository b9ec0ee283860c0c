//! `remedy run`: one remediation from the command line.

use remedy_config::AppConfig;
use remedy_core::event::EventBus;
use remedy_core::run::RunOutcome;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run(
    config: AppConfig,
    file: Option<PathBuf>,
    include_transcript: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.require_agent_credentials()?;

    let raw = match file {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let payload: serde_json::Value = if raw.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&raw).map_err(|e| format!("Event is not valid JSON: {e}"))?
    };

    let provider = remedy_providers::build_from_config(&config)?;
    let tools = Arc::new(remedy_tools::build_from_config(&config).await?);
    let handler = remedy_agent::handler_from_config(&config, provider, tools, Arc::new(EventBus::default()));

    let outcome = handler.handle_value(&payload).await;
    println!("{}", serde_json::to_string_pretty(&render(&outcome, include_transcript))?);

    if let RunOutcome::Failed { error, .. } = &outcome {
        return Err(error.clone().into());
    }
    Ok(())
}

fn render(outcome: &RunOutcome, include_transcript: bool) -> serde_json::Value {
    let mut json = serde_json::json!({
        "outcome": outcome.kind(),
        "steps": outcome.steps(),
        "tool_calls": outcome.transcript().tool_call_count(),
        "result": outcome.summary(),
    });
    if include_transcript {
        json["transcript"] = serde_json::to_value(outcome.transcript()).unwrap_or_default();
    }
    json
}
