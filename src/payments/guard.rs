//! Payment gateway guard.
//!
//! # Responsibilities
//! - Mediate every outbound call to the payment provider
//! - Fail fast while the circuit breaker is open
//! - Retry transient failures with backoff, bounded by a per-call timeout
//! - Bound aggregate request volume with a shared sliding window
//! - Keep usage metrics and expose a side-effect-free health view
//!
//! # Design Decisions
//! - Constructed explicitly by the composition root and shared via `Arc`;
//!   no module-level state
//! - Once admitted, a retry sequence runs on its own task and always
//!   records its outcome, even if the caller stops waiting
//! - Only the terminal outcome of a retrying operation reaches the metrics
//!   and the breaker, so a threshold of 5 means 5 exhausted operations
//! - Fast-fail refusals (breaker open, rate limited) touch neither metrics
//!   nor the breaker
//! - At most one token fetch is in flight at a time
//! - Account references and phone numbers are redacted in every log line

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::GuardConfig;
use crate::error::{ExternalReason, GuardError, GuardResult};
use crate::observability::metrics::{self, UsageMetrics, UsageSnapshot};
use crate::payments::provider::{DarajaClient, PaymentProvider};
use crate::payments::types::{AccessToken, PaymentRequest, PaymentResponse, ValidatedPayment};
use crate::resilience::{
    retry_with_backoff, with_timeout, CircuitBreaker, CircuitBreakerSnapshot, CircuitState,
    RetryPolicy,
};
use crate::security::{redact_phone, redact_reference, RateWindowSnapshot, SlidingWindowLimiter};

const OP_TOKEN: &str = "acquire_access_token";
const OP_PAYMENT: &str = "initiate_payment";

/// Tokens are refreshed this long before the provider says they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Health view returned by [`PaymentGateway::health`].
#[derive(Debug, Clone, Serialize)]
pub struct GatewayHealth {
    pub healthy: bool,
    pub configured: bool,
    pub circuit_breaker: CircuitBreakerSnapshot,
    pub rate_limit: RateWindowSnapshot,
    pub metrics: UsageSnapshot,
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// The payment gateway guard.
pub struct PaymentGateway {
    core: Arc<GatewayCore>,
}

/// State shared between the gateway and the tasks running its sequences.
struct GatewayCore {
    provider: Arc<dyn PaymentProvider>,
    missing_credentials: Vec<&'static str>,
    request_timeout: Duration,
    payment_policy: RetryPolicy,
    token_policy: RetryPolicy,
    breaker: CircuitBreaker,
    usage: UsageMetrics,
    limiter: SlidingWindowLimiter,
    token_cache: Mutex<Option<CachedToken>>,
    token_refresh: tokio::sync::Mutex<()>,
}

/// Spawn `sequence` and wait for it. Dropping the returned future leaves
/// the sequence running.
async fn run_detached<T, F>(operation: &'static str, sequence: F) -> GuardResult<T>
where
    T: Send + 'static,
    F: Future<Output = GuardResult<T>> + Send + 'static,
{
    match tokio::spawn(sequence.in_current_span()).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(GuardError::external(
            operation,
            ExternalReason::Transport(format!("guarded task cancelled: {}", e)),
        )),
    }
}

impl GatewayCore {
    fn is_configured(&self) -> bool {
        self.missing_credentials.is_empty()
    }

    fn ensure_configured(&self) -> GuardResult<()> {
        if self.is_configured() {
            return Ok(());
        }
        Err(GuardError::Configuration(format!(
            "missing M-Pesa credentials: {}",
            self.missing_credentials.join(", ")
        )))
    }

    fn ensure_circuit_closed(&self, operation: &'static str) -> GuardResult<()> {
        let state = self.breaker.check_and_advance(Instant::now());
        metrics::record_circuit_state(state);
        if state == CircuitState::Open {
            tracing::warn!(operation, "Circuit breaker open, failing fast");
            return Err(GuardError::refused(operation, ExternalReason::CircuitOpen));
        }
        Ok(())
    }

    fn record_outcome(&self, operation: &'static str, success: bool, started: Instant) {
        let elapsed = started.elapsed();
        self.usage.record(success, elapsed);
        if success {
            self.breaker.record_success();
        } else {
            self.breaker.record_failure(Instant::now());
        }
        metrics::record_request(operation, success, elapsed);
        metrics::record_circuit_state(self.breaker.snapshot().state);
    }

    fn cached_token(&self, now: Instant) -> Option<String> {
        let cache = self.token_cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .as_ref()
            .filter(|cached| cached.expires_at > now)
            .map(|cached| cached.token.clone())
    }

    fn store_token(&self, token: &AccessToken) {
        let lifetime = token.expires_in.saturating_sub(TOKEN_REFRESH_MARGIN);
        let mut cache = self.token_cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = Some(CachedToken {
            token: token.token.clone(),
            expires_at: Instant::now() + lifetime,
        });
    }

    fn invalidate_token(&self) {
        let mut cache = self.token_cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = None;
    }

    /// One deadline-bounded token fetch; caches on success.
    async fn fetch_token_once(&self) -> GuardResult<String> {
        let token = with_timeout("oauth_token", self.request_timeout, self.provider.fetch_token()).await?;
        self.store_token(&token);
        Ok(token.token)
    }

    /// Cached token, or a single fetch shared by every caller that finds
    /// the cache empty at the same time.
    async fn token_for_attempt(&self) -> GuardResult<String> {
        if let Some(token) = self.cached_token(Instant::now()) {
            return Ok(token);
        }
        let _flight = self.token_refresh.lock().await;
        if let Some(token) = self.cached_token(Instant::now()) {
            return Ok(token);
        }
        self.fetch_token_once().await
    }

    /// Token fetch under the token retry policy. A caller that waited on
    /// another refresh takes its result without recording an outcome.
    async fn refresh_token(&self) -> GuardResult<String> {
        let _flight = self.token_refresh.lock().await;
        if let Some(token) = self.cached_token(Instant::now()) {
            tracing::debug!("Access token refreshed by a concurrent caller");
            return Ok(token);
        }

        let started = Instant::now();
        let result = retry_with_backoff(OP_TOKEN, &self.token_policy, |_| self.fetch_token_once()).await;
        self.record_outcome(OP_TOKEN, result.is_ok(), started);

        match &result {
            Ok(_) => tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Access token acquired"
            ),
            Err(e) => tracing::error!(error = %e, "Failed to acquire access token"),
        }
        result
    }

    /// One attempt of the payment: token (cached or fresh), then STK push.
    async fn push_once(&self, payment: &ValidatedPayment, call_id: Uuid, attempt: u32) -> GuardResult<PaymentResponse> {
        let token = self.token_for_attempt().await?;

        tracing::debug!(%call_id, attempt, "Sending STK push");
        let result = with_timeout(
            "stk_push",
            self.request_timeout,
            self.provider.stk_push(&token, payment),
        )
        .await;

        if let Err(GuardError::ExternalService {
            reason: ExternalReason::Status { status: 401, .. },
            ..
        }) = &result
        {
            self.invalidate_token();
        }
        result
    }

    /// The full retry sequence for an admitted payment.
    async fn pay(&self, payment: ValidatedPayment, call_id: Uuid, reference: String) -> GuardResult<PaymentResponse> {
        let started = Instant::now();
        let result = retry_with_backoff(OP_PAYMENT, &self.payment_policy, |attempt| {
            self.push_once(&payment, call_id, attempt)
        })
        .await;
        self.record_outcome(OP_PAYMENT, result.is_ok(), started);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(ack) => tracing::info!(
                %call_id,
                reference = %reference,
                checkout_request_id = %ack.checkout_request_id,
                elapsed_ms,
                "Payment initiated"
            ),
            Err(e) => tracing::error!(
                %call_id,
                reference = %reference,
                elapsed_ms,
                error = %e,
                "Payment initiation failed"
            ),
        }
        result
    }
}

impl PaymentGateway {
    /// Build a guard around any provider implementation.
    pub fn new(provider: Arc<dyn PaymentProvider>, config: &GuardConfig) -> Self {
        let core = GatewayCore {
            provider,
            missing_credentials: config.mpesa.missing_credentials(),
            request_timeout: Duration::from_millis(config.timeouts.request_ms),
            payment_policy: config.retries.payment.clone(),
            token_policy: config.retries.token.clone(),
            breaker: CircuitBreaker::new(
                config.circuit_breaker.failure_threshold,
                Duration::from_millis(config.circuit_breaker.cooldown_ms),
            ),
            usage: UsageMetrics::new(),
            limiter: SlidingWindowLimiter::new(
                Duration::from_millis(config.rate_limit.window_ms),
                config.rate_limit.max_requests,
            ),
            token_cache: Mutex::new(None),
            token_refresh: tokio::sync::Mutex::new(()),
        };
        Self { core: Arc::new(core) }
    }

    /// Build a guard talking to the Daraja API described by `config`.
    pub fn from_config(config: &GuardConfig) -> GuardResult<Self> {
        let client = DarajaClient::new(config.mpesa.clone())?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn is_configured(&self) -> bool {
        self.core.is_configured()
    }

    /// Obtain a bearer token, retrying the fetch with the token policy.
    pub async fn acquire_access_token(&self) -> GuardResult<String> {
        self.core.ensure_configured()?;
        self.core.ensure_circuit_closed(OP_TOKEN)?;

        if let Some(token) = self.core.cached_token(Instant::now()) {
            tracing::debug!("Using cached access token");
            return Ok(token);
        }

        let core = Arc::clone(&self.core);
        run_detached(OP_TOKEN, async move { core.refresh_token().await }).await
    }

    /// Validate and send a payment request through the guard.
    pub async fn initiate_payment(&self, request: &PaymentRequest) -> GuardResult<PaymentResponse> {
        let call_id = Uuid::new_v4();
        let reference = redact_reference(&request.account_reference);

        let payment = match request.validate() {
            Ok(payment) => payment,
            Err(e) => {
                tracing::warn!(%call_id, reference = %reference, error = %e, "Payment request rejected");
                return Err(e);
            }
        };
        self.core.ensure_configured()?;
        self.core.ensure_circuit_closed(OP_PAYMENT)?;

        tracing::info!(
            %call_id,
            phone = %redact_phone(&payment.phone),
            reference = %reference,
            amount = payment.amount,
            "Initiating payment"
        );

        let core = Arc::clone(&self.core);
        run_detached(OP_PAYMENT, async move { core.pay(payment, call_id, reference).await }).await
    }

    /// Like [`initiate_payment`](Self::initiate_payment), but first takes a
    /// slot in the shared rate window.
    pub async fn initiate_payment_rate_limited(
        &self,
        request: &PaymentRequest,
    ) -> GuardResult<PaymentResponse> {
        if !self.core.limiter.try_acquire() {
            tracing::warn!(
                reference = %redact_reference(&request.account_reference),
                "Payment refused by rate limiter"
            );
            return Err(GuardError::refused(OP_PAYMENT, ExternalReason::RateLimited));
        }
        self.initiate_payment(request).await
    }

    /// Side-effect-free health view.
    pub fn health(&self) -> GatewayHealth {
        let circuit_breaker = self.core.breaker.snapshot();
        let configured = self.core.is_configured();
        GatewayHealth {
            healthy: configured && circuit_breaker.state == CircuitState::Closed,
            configured,
            circuit_breaker,
            rate_limit: self.core.limiter.snapshot(Instant::now()),
            metrics: self.core.usage.snapshot(),
        }
    }

    /// Force the breaker back to Closed.
    pub fn reset_circuit_breaker(&self) {
        self.core.breaker.reset();
        metrics::record_circuit_state(CircuitState::Closed);
    }
}

impl std::fmt::Debug for PaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGateway")
            .field("configured", &self.core.is_configured())
            .field("request_timeout", &self.core.request_timeout)
            .field("breaker", &self.core.breaker.snapshot())
            .finish()
    }
}
