//! Mapping of guard errors onto HTTP responses.
//!
//! | Error | Status |
//! |-------|--------|
//! | Validation | 400 |
//! | Configuration | 500 |
//! | Breaker open | 503 |
//! | Rate limited | 429 |
//! | Timeout | 504 |
//! | Other external | 502 |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{ErrorKind, ExternalReason, GuardError};

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

/// Response wrapper so handlers can return `Result<_, ApiError>`.
#[derive(Debug)]
pub struct ApiError(pub GuardError);

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &GuardError) -> StatusCode {
    match err {
        GuardError::Validation(_) => StatusCode::BAD_REQUEST,
        GuardError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GuardError::ExternalService { reason, .. } => match reason {
            ExternalReason::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            ExternalReason::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ExternalReason::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorBody {
            kind: self.0.kind(),
            message: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(serde_json::json!({ "error": body }))).into_response()
    }
}
