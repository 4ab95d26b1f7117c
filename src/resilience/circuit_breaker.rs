//! Circuit breaker for provider protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: provider assumed down, requests fail fast
//! - Half-Open: the next request is a probe
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: cooldown elapsed since last failure (checked lazily)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (failure timestamp refreshed)
//! ```
//!
//! # Design Decisions
//! - One breaker per guard instance, owned by the composition root
//! - No background timer: `check_and_advance` performs any due transition
//! - A failure counts once per guarded operation, after its retries
//! - All state sits behind one mutex so each transition is atomic

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 = closed, 1 = half-open, 2 = open.
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

/// Point-in-time view of the breaker, safe to serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    /// Unix milliseconds of the last recorded failure.
    pub last_failure_at_ms: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_failure_wall: Option<SystemTime>,
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                last_failure_wall: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the current state after applying any due Open → HalfOpen
    /// transition. This is a query with a side effect.
    pub fn check_and_advance(&self, now: Instant) -> CircuitState {
        let mut inner = self.lock();
        if inner.state == CircuitState::Open {
            let cooled = inner
                .last_failure
                .map(|at| now.saturating_duration_since(at) >= self.cooldown)
                .unwrap_or(true);
            if cooled {
                inner.state = CircuitState::HalfOpen;
                tracing::info!(
                    failure_count = inner.failure_count,
                    "Circuit breaker half-open, allowing probe"
                );
            }
        }
        inner.state
    }

    /// True only while strictly Open (cooldown not yet elapsed).
    ///
    /// Advances to HalfOpen when the cooldown has elapsed, so two calls at
    /// different times may disagree.
    pub fn is_open(&self, now: Instant) -> bool {
        self.check_and_advance(now) == CircuitState::Open
    }

    /// Record a successful guarded operation.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            tracing::info!("Circuit breaker closed after successful probe");
        }
        if inner.state != CircuitState::Open {
            inner.state = CircuitState::Closed;
            inner.failure_count = 0;
        }
    }

    /// Record a failed guarded operation at `now`.
    pub fn record_failure(&self, now: Instant) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(now);
        inner.last_failure_wall = Some(SystemTime::now());

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                tracing::warn!(
                    failure_count = inner.failure_count,
                    "Probe failed, circuit breaker re-opened"
                );
            }
            CircuitState::Closed if inner.failure_count >= self.threshold => {
                inner.state = CircuitState::Open;
                tracing::error!(
                    failure_count = inner.failure_count,
                    threshold = self.threshold,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "Circuit breaker opened"
                );
            }
            _ => {}
        }
    }

    /// Administrative override back to Closed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        tracing::warn!(
            previous_state = ?inner.state,
            failure_count = inner.failure_count,
            "Circuit breaker manually reset"
        );
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
    }

    /// Current state without applying transitions.
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.lock();
        CircuitBreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.threshold,
            cooldown_ms: self.cooldown.as_millis() as u64,
            last_failure_at_ms: inner
                .last_failure_wall
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64),
        }
    }
}
