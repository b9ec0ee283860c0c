//! Process-wide tracing setup.
//!
//! Call [`init`] once at startup. Later calls are no-ops, so tests and
//! embedding code can call it freely.

use remedy_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Filter directive: `RUST_LOG` wins, then `--verbose`, then the config level.
pub fn filter_directive(config: &LoggingConfig, verbose: bool, rust_log: Option<&str>) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ if verbose => "debug".to_string(),
        _ => config.level.clone(),
    }
}

/// Install the global subscriber. Returns whether this call installed it.
pub fn init(config: &LoggingConfig, verbose: bool) -> bool {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(config, verbose, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init().is_ok(),
        LogFormat::Pretty => builder.try_init().is_ok(),
    }
}
