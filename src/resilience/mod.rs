//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Guarded provider call:
//!     → circuit_breaker.rs (fail fast while open)
//!     → retries.rs (attempt loop, backoff.rs for delays)
//!         → timeouts.rs (deadline per attempt)
//!     → circuit_breaker.rs (record terminal outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Client-class rejections are never retried
//! - Circuit breaker prevents piling load on a failing provider

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use backoff::RetryPolicy;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState};
pub use retries::retry_with_backoff;
pub use timeouts::with_timeout;
