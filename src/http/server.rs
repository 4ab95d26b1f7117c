//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for payment initiation and health
//! - Mount the admin routes when enabled
//! - Wire up middleware (tracing, request timeout)
//! - Serve until Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::{AdminConfig, GuardConfig};
use crate::http::handlers;
use crate::payments::PaymentGateway;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<PaymentGateway>,
    pub admin: AdminConfig,
}

/// HTTP front of the payment gateway guard.
pub struct ApiServer {
    router: Router,
    config: GuardConfig,
}

impl ApiServer {
    pub fn new(config: GuardConfig, gateway: Arc<PaymentGateway>) -> Self {
        let state = AppState {
            gateway,
            admin: config.admin.clone(),
        };
        let router = build_router(&config, state);
        Self { router, config }
    }

    /// The fully layered router, for embedding or tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            admin_enabled = self.config.admin.enabled,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// The request timeout only bounds the response; an admitted payment keeps
/// running and records its outcome after a 408.
pub fn build_router(config: &GuardConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/payments/stk-push", post(handlers::initiate_payment))
        .with_state(state.clone());

    if config.admin.enabled {
        app = app.merge(setup_admin_router(state));
    }

    app.layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeouts.server_request_secs),
    ))
        .layer(TraceLayer::new_for_http())
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
