//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds > 0)
//! - Check URLs parse and addresses bind
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Missing credentials are NOT an error here: the guard reports
//!   `configured = false` and answers Configuration errors per call
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::config::schema::GuardConfig;
use crate::resilience::backoff::{backoff_with_jitter, RetryPolicy, JITTER_RATIO};

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(base) = &config.mpesa.base_url {
        if let Err(e) = Url::parse(base) {
            errors.push(ValidationError::new("mpesa.base_url", e.to_string()));
        }
    }

    if !config.mpesa.callback_url.is_empty() {
        match Url::parse(&config.mpesa.callback_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(ValidationError::new(
                "mpesa.callback_url",
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("mpesa.callback_url", e.to_string())),
        }
    }

    if !config.mpesa.shortcode.is_empty()
        && !config.mpesa.shortcode.chars().all(|c| c.is_ascii_digit())
    {
        errors.push(ValidationError::new("mpesa.shortcode", "must be numeric"));
    }

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::new("timeouts.request_ms", "must be greater than 0"));
    }

    if config.timeouts.server_request_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.server_request_secs",
            "must be greater than 0",
        ));
    } else {
        let budget = payment_time_budget(config);
        if Duration::from_secs(config.timeouts.server_request_secs) < budget {
            tracing::warn!(
                server_request_secs = config.timeouts.server_request_secs,
                payment_budget_ms = budget.as_millis() as u64,
                "HTTP timeout is shorter than the worst-case payment; slow payments will answer 408 and finish in the background"
            );
        }
    }

    validate_policy("retries.payment", &config.retries.payment, &mut errors);
    validate_policy("retries.token", &config.retries.token, &mut errors);

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be greater than 0",
        ));
    }

    if config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.window_ms", "must be greater than 0"));
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("server.bind_address", "not a socket address"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Worst-case wall time of one guarded payment: per attempt a token fetch
/// and an STK push, each up to `request_ms`, plus the capped backoff
/// between attempts at full jitter.
pub fn payment_time_budget(config: &GuardConfig) -> Duration {
    let policy = &config.retries.payment;
    let attempts = policy.max_retries.max(1);
    let calls = Duration::from_millis(config.timeouts.request_ms)
        .saturating_mul(attempts)
        .saturating_mul(2);
    let backoff = (1..attempts)
        .map(|attempt| backoff_with_jitter(attempt, policy, JITTER_RATIO))
        .fold(Duration::ZERO, Duration::saturating_add);
    calls.saturating_add(backoff)
}

fn validate_policy(prefix: &str, policy: &RetryPolicy, errors: &mut Vec<ValidationError>) {
    if policy.max_retries == 0 {
        errors.push(ValidationError::new(
            format!("{}.max_retries", prefix),
            "must allow at least one attempt",
        ));
    }
    if policy.max_delay_ms < policy.base_delay_ms {
        errors.push(ValidationError::new(
            format!("{}.max_delay_ms", prefix),
            "must be at least base_delay_ms",
        ));
    }
    if !policy.backoff_multiplier.is_finite() || policy.backoff_multiplier < 1.0 {
        errors.push(ValidationError::new(
            format!("{}.backoff_multiplier", prefix),
            "must be a finite value >= 1.0",
        ));
    }
}
