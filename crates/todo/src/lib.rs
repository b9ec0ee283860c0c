//! A small in-memory to-do API.
//!
//! This is the application the remediation agent repairs. Besides plain CRUD
//! it has a `/error` route that fails on demand, logging the failure as a
//! structured error event for the log forwarder to pick up.

pub mod error;
pub mod frontend;
pub mod store;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use remedy_config::TodoConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub use error::TodoError;
pub use store::{NewTodo, TodoItem, TodoStore, TodoUpdate};

type SharedStore = Arc<TodoStore>;

/// Build the Axum router with all to-do routes.
pub fn build_router(store: SharedStore) -> Router {
    Router::new()
        .route("/", get(frontend::index_handler))
        .route("/todos/", get(list_todos).post(create_todo))
        .route("/todos", get(list_todos).post(create_todo))
        .route(
            "/todos/{id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .route("/error", get(raise_error))
        .with_state(store)
        .layer(TraceLayer::new_for_http())
}

/// Start the to-do HTTP server.
pub async fn start(config: &TodoConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(Arc::new(TodoStore::new()));
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Todo service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn create_todo(
    State(store): State<SharedStore>,
    Json(new): Json<NewTodo>,
) -> (StatusCode, Json<TodoItem>) {
    let item = store.create(new).await;
    (StatusCode::CREATED, Json(item))
}

async fn list_todos(State(store): State<SharedStore>) -> Json<Vec<TodoItem>> {
    Json(store.list().await)
}

async fn get_todo(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<Json<TodoItem>, TodoError> {
    store.get(&id).await.map(Json).ok_or(TodoError::NotFound)
}

async fn update_todo(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
    Json(update): Json<TodoUpdate>,
) -> Result<Json<TodoItem>, TodoError> {
    store
        .update(&id, update)
        .await
        .map(Json)
        .ok_or(TodoError::NotFound)
}

async fn delete_todo(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
) -> Result<StatusCode, TodoError> {
    if store.delete(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(TodoError::NotFound)
    }
}

async fn raise_error(Query(params): Query<HashMap<String, String>>) -> TodoError {
    let Some(msg) = params.get("msg") else {
        return TodoError::Validation("query parameter 'msg' is required".into());
    };
    error!(error_message = %msg, route = "/error", "Unhandled exception in request");
    TodoError::Deliberate(msg.clone())
}
