//! Sliding window rate limiter for outbound provider calls.
//!
//! One shared window per guard: it bounds aggregate throughput to the
//! provider, not per-caller fairness.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::observability::metrics;

/// Occupancy of the window at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateWindowSnapshot {
    pub in_window: usize,
    pub max_requests: usize,
    pub window_ms: u64,
}

/// Timestamps of accepted requests inside the trailing window.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: usize,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests.min(1024))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.timestamps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record a request at `now` if the window has room.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, now);

        if timestamps.len() >= self.max_requests {
            tracing::warn!(
                in_window = timestamps.len(),
                max_requests = self.max_requests,
                window_ms = self.window.as_millis() as u64,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited("payment_window");
            return false;
        }

        timestamps.push_back(now);
        true
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Requests counted in the window ending at `now`. Read-only.
    pub fn in_window(&self, now: Instant) -> usize {
        self.lock()
            .iter()
            .filter(|at| now.saturating_duration_since(**at) < self.window)
            .count()
    }

    pub fn snapshot(&self, now: Instant) -> RateWindowSnapshot {
        RateWindowSnapshot {
            in_window: self.in_window(now),
            max_requests: self.max_requests,
            window_ms: self.window.as_millis() as u64,
        }
    }
}
