//! Gateway-facing errors and their HTTP mapping (§6, §7 "Session-not-found").

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use coday_core::CodayError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no session for client {0}")]
    SessionNotFound(String),

    #[error("no active agent loop for client {0}")]
    NoActiveRun(String),

    #[error("malformed request body: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] CodayError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::NoActiveRun(_) => StatusCode::BAD_REQUEST,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Core(CodayError::ThreadNotFound(_)) => StatusCode::NOT_FOUND,
            GatewayError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
