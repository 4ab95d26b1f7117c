//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound payment request:
//!     → rate_limit.rs (shared sliding window)
//!     → guard → provider
//!
//! Every log line about a payment:
//!     → redact.rs (account reference prefix, masked phone)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a full window rejects without calling out
//! - Sensitive identifiers never appear unmasked in logs

pub mod rate_limit;
pub mod redact;

pub use rate_limit::{RateWindowSnapshot, SlidingWindowLimiter};
pub use redact::{redact_phone, redact_reference};
