//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Keep the guard's own usage counters and running mean latency
//! - Mirror outcomes to the `metrics` facade for Prometheus scraping
//!
//! # Metrics
//! - `mpesa_requests_total` (counter): guarded operations by operation, outcome
//! - `mpesa_request_duration_seconds` (histogram): latency per operation
//! - `mpesa_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `mpesa_rate_limited_total` (counter): calls refused by the window
//!
//! # Design Decisions
//! - One terminal outcome per guarded operation; retries inside it are not
//!   counted separately
//! - Counters live behind a single mutex so the mean and the count always
//!   agree

use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;

use crate::resilience::CircuitState;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record the terminal outcome of a guarded operation.
pub fn record_request(operation: &'static str, success: bool, elapsed: Duration) {
    let outcome = if success { "success" } else { "failure" };
    ::metrics::counter!("mpesa_requests_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    ::metrics::histogram!("mpesa_request_duration_seconds", "operation" => operation)
        .record(elapsed.as_secs_f64());
}

pub fn record_circuit_state(state: CircuitState) {
    ::metrics::gauge!("mpesa_circuit_state").set(state.as_gauge());
}

pub fn record_rate_limited(window: &'static str) {
    ::metrics::counter!("mpesa_rate_limited_total", "window" => window).increment(1);
}

/// Serializable copy of [`UsageMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time_ms: f64,
    /// Unix milliseconds of the last recorded request.
    pub last_request_at_ms: Option<u64>,
}

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    successful: u64,
    failed: u64,
    average_ms: f64,
    last_request: Option<SystemTime>,
}

/// Usage counters for the guard's lifetime.
#[derive(Debug, Default)]
pub struct UsageMetrics {
    counters: Mutex<Counters>,
}

impl UsageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one terminal outcome with its latency.
    pub fn record(&self, success: bool, elapsed: Duration) {
        let sample_ms = elapsed.as_secs_f64() * 1_000.0;
        let mut c = self.lock();
        c.total += 1;
        if success {
            c.successful += 1;
        } else {
            c.failed += 1;
        }
        let n = c.total as f64;
        c.average_ms = (c.average_ms * (n - 1.0) + sample_ms) / n;
        c.last_request = Some(SystemTime::now());
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let c = self.lock();
        UsageSnapshot {
            total_requests: c.total,
            successful_requests: c.successful,
            failed_requests: c.failed,
            average_response_time_ms: c.average_ms,
            last_request_at_ms: c
                .last_request
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean_matches_arithmetic_mean() {
        let metrics = UsageMetrics::new();
        let samples = [120u64, 80, 300, 45, 1_000, 7];
        for (i, ms) in samples.iter().enumerate() {
            metrics.record(i % 2 == 0, Duration::from_millis(*ms));
        }

        let snap = metrics.snapshot();
        let expected = samples.iter().sum::<u64>() as f64 / samples.len() as f64;
        assert!((snap.average_response_time_ms - expected).abs() < 1e-9);
        assert_eq!(snap.total_requests, 6);
        assert_eq!(snap.successful_requests, 3);
        assert_eq!(snap.failed_requests, 3);
        assert!(snap.last_request_at_ms.is_some());
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = UsageMetrics::new().snapshot();
        assert_eq!(snap, UsageSnapshot::default());
    }

    #[test]
    fn test_facade_calls_without_recorder() {
        // No exporter installed: the facade must be a no-op.
        record_request("initiate_payment", true, Duration::from_millis(5));
        record_circuit_state(CircuitState::Open);
        record_rate_limited("payment_window");
    }
}
