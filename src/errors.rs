use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::decorate::DecorateError;

/// Errors a handler can return; every variant renders as `{"error": "..."}`.
#[derive(Debug)]
pub enum AppError {
    /// The request body could not be used.
    BadRequest(String),
    /// Failures from the decorate pipeline.
    Decorate(DecorateError),
}

impl From<DecorateError> for AppError {
    fn from(err: DecorateError) -> Self {
        AppError::Decorate(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            AppError::BadRequest(msg) => {
                warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Decorate(err) => {
                let status = match &err {
                    DecorateError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    DecorateError::UpstreamUnavailable { .. }
                    | DecorateError::UpstreamEmptyResult
                    | DecorateError::UpstreamMalformedResult(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    // Keep upstream detail in the logs only.
                    error!("DecorateError: {:?}", err);
                } else {
                    warn!("DecorateError: {}", err);
                }
                (status, err.to_string())
            }
        };

        (status_code, Json(json!({ "error": error_message }))).into_response()
    }
}
