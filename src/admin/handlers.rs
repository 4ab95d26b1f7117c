use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::payments::GatewayHealth;
use crate::resilience::CircuitBreakerSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub gateway: GatewayHealth,
}

#[derive(Serialize)]
pub struct ResetResult {
    pub reset: bool,
    pub circuit_breaker: CircuitBreakerSnapshot,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let gateway = state.gateway.health();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if gateway.healthy { "operational" } else { "degraded" },
        gateway,
    })
}

pub async fn reset_circuit_breaker(State(state): State<AppState>) -> Json<ResetResult> {
    state.gateway.reset_circuit_breaker();
    Json(ResetResult {
        reset: true,
        circuit_breaker: state.gateway.health().circuit_breaker,
    })
}
