//! Payment and health handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::payments::{PaymentRequest, PaymentResponse};

/// `POST /api/v1/payments/stk-push`
pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let ack = state.gateway.initiate_payment_rate_limited(&request).await?;
    Ok(Json(ack))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.gateway.health();
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}
