//! HTTP surface consumed by the rest of the application.
//!
//! # Data Flow
//! ```text
//! POST /api/v1/payments/stk-push
//!     → handlers.rs (JSON → PaymentRequest)
//!     → PaymentGateway::initiate_payment_rate_limited
//!     → response.rs (GuardError → status + JSON body)
//!
//! GET /health → PaymentGateway::health (200 healthy, 503 otherwise)
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{build_router, ApiServer, AppState};
