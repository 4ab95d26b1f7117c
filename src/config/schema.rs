//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::resilience::backoff::RetryPolicy;

/// Root configuration for the payment gateway guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Provider credentials and endpoints.
    pub mpesa: MpesaConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry policies for token and payment calls.
    pub retries: RetryConfig,

    /// Circuit breaker thresholds.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Outbound rate limiting.
    pub rate_limit: RateLimitConfig,

    /// HTTP listener for the payment API.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Provider environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MpesaEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    /// Default API base URL for this environment.
    pub fn base_url(&self) -> &'static str {
        match self {
            MpesaEnvironment::Sandbox => "https://sandbox.safaricom.co.ke",
            MpesaEnvironment::Production => "https://api.safaricom.co.ke",
        }
    }
}

impl std::str::FromStr for MpesaEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(MpesaEnvironment::Sandbox),
            "production" | "live" => Ok(MpesaEnvironment::Production),
            other => Err(format!("unknown M-Pesa environment '{}'", other)),
        }
    }
}

/// M-Pesa Daraja credentials and endpoints.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MpesaConfig {
    /// Sandbox or production.
    pub environment: MpesaEnvironment,

    /// Overrides the environment's base URL (e.g. a local stub).
    pub base_url: Option<String>,

    /// OAuth consumer key.
    pub consumer_key: String,

    /// OAuth consumer secret.
    pub consumer_secret: String,

    /// Paybill / till short code.
    pub shortcode: String,

    /// Lipa na M-Pesa Online passkey.
    pub passkey: String,

    /// Where the provider posts the payment result.
    pub callback_url: String,
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            environment: MpesaEnvironment::Sandbox,
            base_url: None,
            consumer_key: String::new(),
            consumer_secret: String::new(),
            shortcode: String::new(),
            passkey: String::new(),
            callback_url: String::new(),
        }
    }
}

impl MpesaConfig {
    /// True when every credential needed to call the provider is present.
    pub fn is_configured(&self) -> bool {
        [
            &self.consumer_key,
            &self.consumer_secret,
            &self.shortcode,
            &self.passkey,
            &self.callback_url,
        ]
        .iter()
        .all(|v| !v.trim().is_empty())
    }

    /// Names of credentials that are missing.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.consumer_key.trim().is_empty() {
            missing.push("consumer_key");
        }
        if self.consumer_secret.trim().is_empty() {
            missing.push("consumer_secret");
        }
        if self.shortcode.trim().is_empty() {
            missing.push("shortcode");
        }
        if self.passkey.trim().is_empty() {
            missing.push("passkey");
        }
        if self.callback_url.trim().is_empty() {
            missing.push("callback_url");
        }
        missing
    }

    /// Effective base URL without a trailing slash.
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(self.environment.base_url())
            .trim_end_matches('/')
            .to_string()
    }
}

// Secrets stay out of Debug output.
impl std::fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("environment", &self.environment)
            .field("base_url", &self.resolved_base_url())
            .field("shortcode", &self.shortcode)
            .field("callback_url", &self.callback_url)
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-call deadline for provider requests in milliseconds.
    pub request_ms: u64,

    /// Timeout for inbound HTTP requests to this service, in seconds.
    pub server_request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            server_request_secs: 190,
        }
    }
}

/// Retry policies.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Policy for STK push requests.
    pub payment: RetryPolicy,

    /// Policy for OAuth token requests (fewer attempts).
    pub token: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            payment: RetryPolicy::default(),
            token: RetryPolicy {
                max_retries: 2,
                base_delay_ms: 500,
                max_delay_ms: 5_000,
                backoff_multiplier: 2.0,
            },
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failed operations before the circuit opens.
    pub failure_threshold: u32,

    /// Time the circuit stays open before probing, in milliseconds.
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 60_000,
        }
    }
}

/// Sliding window rate limit for outbound payment calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum calls inside one window.
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 100,
        }
    }
}

/// Listener for the payment API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.timeouts.request_ms, 30_000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.cooldown_ms, 60_000);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.retries.payment.max_retries, 3);
        assert!(config.retries.token.max_retries < config.retries.payment.max_retries);
        assert!(!config.mpesa.is_configured());
    }

    #[test]
    fn test_partial_toml() {
        let config: GuardConfig = toml::from_str(
            r#"
            [mpesa]
            environment = "production"
            consumer_key = "key"

            [rate_limit]
            max_requests = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.mpesa.environment, MpesaEnvironment::Production);
        assert_eq!(config.mpesa.resolved_base_url(), "https://api.safaricom.co.ke");
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(
            config.mpesa.missing_credentials(),
            vec!["consumer_secret", "shortcode", "passkey", "callback_url"]
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut config = MpesaConfig::default();
        config.consumer_secret = "super-secret".into();
        config.passkey = "pass-key-value".into();
        let out = format!("{:?}", config);
        assert!(!out.contains("super-secret"));
        assert!(!out.contains("pass-key-value"));
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let config = MpesaConfig {
            base_url: Some("http://127.0.0.1:9999/".into()),
            ..MpesaConfig::default()
        };
        assert_eq!(config.resolved_base_url(), "http://127.0.0.1:9999");
    }
}
