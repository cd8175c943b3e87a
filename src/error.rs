use axum::{http::StatusCode, response::IntoResponse, response::Json};
use serde_json::json;

/// Fatal pipeline errors (§7). Only these three fail a request; every other
/// stage failure is a degradation signal logged via `tracing::warn!` and
/// absorbed into the response (see `pipeline::run`).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    fn tag(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "InvalidRequest",
            PipelineError::BackendUnavailable(_) => "BackendUnavailable",
            PipelineError::Internal(_) => "Internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PipelineError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.tag(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
