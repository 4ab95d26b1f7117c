//! M-Pesa Daraja HTTP client.
//!
//! # Responsibilities
//! - Fetch OAuth client-credentials tokens
//! - Send STK push (Lipa na M-Pesa Online) requests
//! - Classify provider answers into `ExternalReason`s
//!
//! Deadlines, retries and the circuit breaker live in the guard; this
//! client performs exactly one HTTP exchange per call.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use reqwest::{Client, Response, StatusCode};

use crate::config::MpesaConfig;
use crate::error::{ExternalReason, GuardError, GuardResult};
use crate::payments::types::{
    AccessToken, PaymentResponse, ProviderErrorBody, StkPushBody, TokenResponse, ValidatedPayment,
};

const TOKEN_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

/// East Africa Time, UTC+03:00, no daylight saving.
const EAT_OFFSET_SECS: i32 = 3 * 3600;

/// Outbound calls the guard protects.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Fetch a fresh bearer token.
    async fn fetch_token(&self) -> GuardResult<AccessToken>;

    /// Ask the provider to push a payment prompt to the payer's handset.
    async fn stk_push(&self, token: &str, payment: &ValidatedPayment) -> GuardResult<PaymentResponse>;
}

/// Daraja API client.
#[derive(Clone)]
pub struct DarajaClient {
    http: Client,
    config: MpesaConfig,
    base_url: String,
}

impl DarajaClient {
    pub fn new(config: MpesaConfig) -> GuardResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("mpesa-guard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GuardError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        let base_url = config.resolved_base_url();

        tracing::info!(
            base_url = %base_url,
            environment = ?config.environment,
            "Daraja client initialized"
        );

        Ok(Self {
            http,
            config,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn password(&self, timestamp: &str) -> String {
        stk_password(&self.config.shortcode, &self.config.passkey, timestamp)
    }
}

/// `base64(shortcode + passkey + timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

fn east_africa_time() -> FixedOffset {
    FixedOffset::east_opt(EAT_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// `YYYYMMDDHHmmss` in East Africa Time, whatever the host timezone.
pub fn stk_timestamp<Tz: TimeZone>(now: DateTime<Tz>) -> String {
    now.with_timezone(&east_africa_time())
        .format("%Y%m%d%H%M%S")
        .to_string()
}

fn transport(operation: &'static str, err: reqwest::Error) -> GuardError {
    GuardError::from(err).for_operation(operation)
}

/// Turn a non-success response into a `Status` error, keeping the
/// provider's own message when it sent one.
async fn status_error(operation: &'static str, response: Response) -> GuardError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ProviderErrorBody = serde_json::from_str(&text).unwrap_or_default();

    let message = match (body.error_code, body.error_message) {
        (Some(code), Some(message)) => format!("{} ({})", message, code),
        (None, Some(message)) => message,
        _ if !text.is_empty() => text.chars().take(200).collect(),
        _ => status.canonical_reason().unwrap_or("no body").to_string(),
    };

    GuardError::external(
        operation,
        ExternalReason::Status {
            status: status.as_u16(),
            message,
        },
    )
}

#[async_trait]
impl PaymentProvider for DarajaClient {
    async fn fetch_token(&self) -> GuardResult<AccessToken> {
        const OP: &str = "oauth_token";
        let url = format!("{}{}", self.base_url, TOKEN_PATH);

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| transport(OP, e))?;

        if !response.status().is_success() {
            return Err(status_error(OP, response).await);
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            GuardError::external(OP, ExternalReason::InvalidResponse(e.to_string()))
        })?;

        if body.access_token.is_empty() {
            return Err(GuardError::external(
                OP,
                ExternalReason::InvalidResponse("empty access_token".into()),
            ));
        }

        Ok(AccessToken {
            token: body.access_token,
            expires_in: Duration::from_secs(body.expires_in),
        })
    }

    async fn stk_push(&self, token: &str, payment: &ValidatedPayment) -> GuardResult<PaymentResponse> {
        const OP: &str = "stk_push";
        let url = format!("{}{}", self.base_url, STK_PUSH_PATH);
        let timestamp = stk_timestamp(Utc::now());

        let body = StkPushBody {
            business_short_code: &self.config.shortcode,
            password: self.password(&timestamp),
            timestamp,
            transaction_type: TRANSACTION_TYPE,
            amount: payment.amount,
            party_a: &payment.phone,
            party_b: &self.config.shortcode,
            phone_number: &payment.phone,
            call_back_url: &self.config.callback_url,
            account_reference: &payment.account_reference,
            transaction_desc: &payment.description,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(OP, e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(endpoint = STK_PUSH_PATH, "Provider rejected bearer token");
        }
        if !response.status().is_success() {
            return Err(status_error(OP, response).await);
        }

        let ack: PaymentResponse = response.json().await.map_err(|e| {
            GuardError::external(OP, ExternalReason::InvalidResponse(e.to_string()))
        })?;

        if !ack.is_accepted() {
            return Err(GuardError::external(
                OP,
                ExternalReason::Rejected {
                    code: ack.response_code,
                    message: ack.response_description,
                },
            ));
        }

        Ok(ack)
    }
}

impl std::fmt::Debug for DarajaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarajaClient")
            .field("base_url", &self.base_url)
            .field("environment", &self.config.environment)
            .finish()
    }
}
