//! M-Pesa payment gateway guard library.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod payments;
pub mod resilience;
pub mod security;

pub use config::GuardConfig;
pub use error::{ErrorKind, ExternalReason, GuardError, GuardResult};
pub use http::ApiServer;
pub use payments::{PaymentGateway, PaymentRequest, PaymentResponse};
