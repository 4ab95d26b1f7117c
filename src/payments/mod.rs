//! Payment gateway subsystem.
//!
//! # Data Flow
//! ```text
//! PaymentRequest (from the application)
//!     → types.rs (validate, normalise phone, wire amount)
//!     → guard.rs (rate window, breaker, retries, timeout, metrics)
//!     → provider.rs (Daraja OAuth + STK push over HTTPS)
//!     → PaymentResponse or typed GuardError
//! ```

pub mod guard;
pub mod provider;
pub mod types;

pub use guard::{GatewayHealth, PaymentGateway};
pub use provider::{DarajaClient, PaymentProvider};
pub use types::{AccessToken, PaymentRequest, PaymentResponse, ValidatedPayment};
