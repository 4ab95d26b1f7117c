//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Guard and HTTP layers produce:
//!     → logging.rs (structured tracing events, redacted identifiers)
//!     → metrics.rs (usage counters, Prometheus facade)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → /health (usage snapshot)
//! ```

pub mod logging;
pub mod metrics;

pub use metrics::{UsageMetrics, UsageSnapshot};
