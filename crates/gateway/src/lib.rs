//! HTTP gateway for Remedy.
//!
//! Receives error-report webhooks and answers with the outcome of the
//! remediation run each one triggers. Built on Axum.

pub mod signature;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use remedy_agent::{ErrorEvent, RemediationHandler};
use remedy_config::AppConfig;
use remedy_core::event::EventBus;
use remedy_core::run::RunOutcome;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Largest accepted webhook body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub handler: Arc<RemediationHandler>,
    pub webhook_secret: Option<String>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/run_agent/", post(run_agent_handler))
        .route("/run_agent", post(run_agent_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
}

/// Start the gateway HTTP server.
///
/// Credentials are checked before anything is bound, so a misconfigured
/// deployment fails at startup rather than on its first webhook.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.require_agent_credentials()?;

    let provider = remedy_providers::build_from_config(&config)?;
    let tools = Arc::new(remedy_tools::build_from_config(&config).await?);
    let event_bus = Arc::new(EventBus::default());
    let handler = remedy_agent::handler_from_config(&config, provider, tools, event_bus);

    let state = Arc::new(GatewayState {
        handler: Arc::new(handler),
        webhook_secret: config.gateway.webhook_secret.clone().filter(|s| !s.is_empty()),
    });
    let app = build_router(state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Body returned for every terminal outcome.
#[derive(Debug, Serialize)]
pub struct RunAgentResponse {
    pub status: &'static str,
    pub outcome: &'static str,
    pub steps: u32,
    pub result: String,
}

impl RunAgentResponse {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        Self {
            status: "completed",
            outcome: outcome.kind(),
            steps: outcome.steps(),
            result: outcome.summary(),
        }
    }
}

/// Completed and StepLimitExceeded are answers; Failed means the model upstream broke.
pub fn status_for(outcome: &RunOutcome) -> StatusCode {
    match outcome {
        RunOutcome::Completed { .. } | RunOutcome::StepLimitExceeded { .. } => StatusCode::OK,
        RunOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
    }
}

async fn run_agent_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.webhook_secret {
        let provided = headers
            .get(signature::SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !signature::verify(secret, &body, provided) {
            warn!("Webhook rejected: missing or invalid signature");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "detail": "invalid signature" })),
            )
                .into_response();
        }
    }

    let payload = parse_payload(&body);
    let event = ErrorEvent::from_value(&payload);
    info!(
        body_len = body.len(),
        service = event.service.as_deref().unwrap_or("-"),
        "Webhook received"
    );

    let outcome = state.handler.handle(&event).await;
    (status_for(&outcome), Json(RunAgentResponse::from_outcome(&outcome))).into_response()
}

/// Malformed bodies become an empty event rather than a rejection.
fn parse_payload(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Webhook body is not valid JSON, treating as empty event");
            Value::Null
        }
    }
}
