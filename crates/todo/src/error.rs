//! Error responses for the to-do API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

/// Errors the to-do API reports to clients as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Todo not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    /// Raised on purpose by `/error`.
    #[error("{0}")]
    Deliberate(String),
}

impl TodoError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Deliberate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TodoError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (self.status(), body).into_response()
    }
}
