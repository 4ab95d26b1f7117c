//! Error taxonomy for the payment gateway guard.
//!
//! Three kinds reach callers:
//! - `Validation`: the request itself is wrong; never retried, never counted
//!   against the provider.
//! - `Configuration`: credentials or settings are missing.
//! - `ExternalService`: the provider is unreachable, slow, rejecting, or the
//!   guard is refusing to call it (breaker open, rate limited).

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Configuration,
    ExternalService,
}

/// Why an external service call did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalReason {
    /// Circuit breaker is open; no call was attempted.
    #[error("service unavailable: circuit breaker open")]
    CircuitOpen,

    /// Shared request window is full; no call was attempted.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The provider did not answer within the deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Connection-level failure (DNS, TLS, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider accepted the HTTP call but declined the request.
    #[error("provider rejected request ({code}): {message}")]
    Rejected { code: String, message: String },

    /// The provider answered but the body could not be understood.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ExternalReason {
    /// Client-class provider rejections: 4xx statuses and explicit
    /// business rejections.
    pub fn is_client_error(&self) -> bool {
        match self {
            ExternalReason::Status { status, .. } => (400..500).contains(status),
            ExternalReason::Rejected { .. } => true,
            _ => false,
        }
    }
}

/// Errors surfaced by the guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{operation} failed after {attempts} attempt(s): {reason}")]
    ExternalService {
        operation: &'static str,
        attempts: u32,
        reason: ExternalReason,
    },
}

/// Result type for guarded operations.
pub type GuardResult<T> = Result<T, GuardError>;

impl GuardError {
    /// Build an external service error for a single attempt.
    pub fn external(operation: &'static str, reason: ExternalReason) -> Self {
        GuardError::ExternalService {
            operation,
            attempts: 1,
            reason,
        }
    }

    /// Fast-fail error: the guard refused before calling out.
    pub fn refused(operation: &'static str, reason: ExternalReason) -> Self {
        GuardError::ExternalService {
            operation,
            attempts: 0,
            reason,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GuardError::Validation(_) => ErrorKind::Validation,
            GuardError::Configuration(_) => ErrorKind::Configuration,
            GuardError::ExternalService { .. } => ErrorKind::ExternalService,
        }
    }

    /// The external reason, if this is an external service error.
    pub fn reason(&self) -> Option<&ExternalReason> {
        match self {
            GuardError::ExternalService { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Only external service errors are retryable, and of those not the
    /// guard's own refusals nor 4xx-class provider rejections.
    pub fn is_retryable(&self) -> bool {
        match self.reason() {
            Some(ExternalReason::CircuitOpen) | Some(ExternalReason::RateLimited) => false,
            Some(reason) => !reason.is_client_error(),
            None => false,
        }
    }

    /// Replace the attempt count, keeping operation and reason.
    pub fn with_attempts(self, attempts: u32) -> Self {
        match self {
            GuardError::ExternalService {
                operation, reason, ..
            } => GuardError::ExternalService {
                operation,
                attempts,
                reason,
            },
            other => other,
        }
    }

    /// Re-label an external error with the guarded operation's name.
    pub fn for_operation(self, operation: &'static str) -> Self {
        match self {
            GuardError::ExternalService {
                attempts, reason, ..
            } => GuardError::ExternalService {
                operation,
                attempts,
                reason,
            },
            other => other,
        }
    }
}

impl From<reqwest::Error> for GuardError {
    fn from(err: reqwest::Error) -> Self {
        let reason = if err.is_decode() {
            ExternalReason::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ExternalReason::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ExternalReason::Transport(err.to_string())
        };
        GuardError::external("provider_call", reason)
    }
}
