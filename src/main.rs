//! M-Pesa payment gateway guard (v1)
//!
//! Mediates outbound calls to the M-Pesa Daraja API for the rest of the
//! application.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                  MPESA GUARD                      │
//!                      │                                                   │
//!   App request        │  ┌────────┐   ┌─────────────┐   ┌─────────────┐  │
//!   ───────────────────┼─▶│  http  │──▶│ rate window │──▶│   guard     │  │
//!                      │  │ (axum) │   │ (security)  │   │ validation  │  │
//!                      │  └────────┘   └─────────────┘   └──────┬──────┘  │
//!                      │                                        │         │
//!                      │                                        ▼         │
//!                      │  ┌──────────────────────────────────────────┐    │
//!                      │  │ resilience: breaker → retry → timeout    │    │
//!                      │  └──────────────────────┬───────────────────┘    │
//!                      │                         ▼                        │      Daraja
//!   App response       │                 ┌──────────────┐                 │      API
//!   ◀──────────────────┼─────────────────│   provider   │◀────────────────┼──────────▶
//!                      │                 │  (reqwest)   │                 │
//!                      │                 └──────────────┘                 │
//!                      │  Cross-cutting: config, observability, admin     │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use mpesa_guard::config::{self, GuardConfig};
use mpesa_guard::observability::{logging, metrics};
use mpesa_guard::{ApiServer, PaymentGateway};

#[derive(Parser)]
#[command(name = "mpesa-guard")]
#[command(about = "Guarded gateway to the M-Pesa Daraja API", long_about = None)]
struct Args {
    /// TOML configuration file; defaults plus environment when omitted.
    #[arg(short, long, env = "MPESA_GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config: GuardConfig = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!("mpesa-guard v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.server.bind_address,
        mpesa = ?config.mpesa,
        request_timeout_ms = config.timeouts.request_ms,
        failure_threshold = config.circuit_breaker.failure_threshold,
        rate_limit = config.rate_limit.max_requests,
        "Configuration loaded"
    );

    if !config.mpesa.is_configured() {
        tracing::warn!(
            missing = ?config.mpesa.missing_credentials(),
            "M-Pesa credentials incomplete; payment calls will fail with a configuration error"
        );
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = Arc::new(PaymentGateway::from_config(&config)?);

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = ApiServer::new(config, gateway);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
