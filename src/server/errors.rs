use crate::error::{ErrorCategory, TaxonomyError};
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

/// Errors returned by the HTTP handlers.
///
/// The body is always `{"error": "<message>"}` with a message fit for an end
/// user; the full error is logged.
#[derive(Debug)]
pub enum ApiError {
    /// Failures from the generation pipeline.
    Taxonomy(TaxonomyError),
    /// A malformed request the pipeline never saw.
    BadRequest(String),
    /// The multipart body could not be read.
    Multipart(MultipartError),
}

impl From<TaxonomyError> for ApiError {
    fn from(err: TaxonomyError) -> Self {
        ApiError::Taxonomy(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart(err)
    }
}

/// HTTP status for a pipeline error.
pub fn status_for(err: &TaxonomyError) -> StatusCode {
    if let TaxonomyError::FileTooLarge { .. } = err {
        return StatusCode::PAYLOAD_TOO_LARGE;
    }
    match err.category() {
        ErrorCategory::Input => StatusCode::BAD_REQUEST,
        ErrorCategory::Document => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::Model => StatusCode::BAD_GATEWAY,
        ErrorCategory::Configuration | ErrorCategory::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            ApiError::Taxonomy(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    error!("Taxonomy generation failed: {}", err);
                } else {
                    warn!("Rejected request: {}", err);
                }
                (status, err.user_message())
            }
            ApiError::BadRequest(message) => {
                warn!("Bad request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
            ApiError::Multipart(err) => {
                warn!("Multipart error: {}", err);
                let status = err.status();
                let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "The uploaded file is too large.".to_string()
                } else {
                    err.body_text()
                };
                (status, message)
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status_code, body).into_response()
    }
}
