//! Shared utilities for integration tests.

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mpesa_guard::config::GuardConfig;
use mpesa_guard::resilience::RetryPolicy;

pub const TOKEN_PATH: &str = "/oauth/v1/generate";
pub const STK_PATH: &str = "/mpesa/stkpush/v1/processrequest";
pub const ACCESS_TOKEN: &str = "test-access-token";

/// Configuration pointing at a mock provider, with short retry delays.
#[allow(dead_code)]
pub fn guard_config(base_url: &str) -> GuardConfig {
    let mut config = GuardConfig::default();
    config.mpesa.base_url = Some(base_url.to_string());
    config.mpesa.consumer_key = "consumer-key".into();
    config.mpesa.consumer_secret = "consumer-secret".into();
    config.mpesa.shortcode = "174379".into();
    config.mpesa.passkey = "test-passkey".into();
    config.mpesa.callback_url = "https://shop.example.com/mpesa/callback".into();
    config.timeouts.request_ms = 2_000;
    let fast = RetryPolicy {
        max_retries: 3,
        base_delay_ms: 10,
        max_delay_ms: 50,
        backoff_multiplier: 2.0,
    };
    config.retries.payment = fast.clone();
    config.retries.token = RetryPolicy {
        max_retries: 2,
        ..fast
    };
    config.observability.metrics_enabled = false;
    config
}

#[allow(dead_code)]
pub fn stk_ack() -> Value {
    json!({
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": "ws_CO_191220191020363925",
        "ResponseCode": "0",
        "ResponseDescription": "Success. Request accepted for processing",
        "CustomerMessage": "Success. Request accepted for processing"
    })
}

/// Token endpoint that always succeeds.
#[allow(dead_code)]
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(query_param("grant_type", "client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "expires_in": "3599"
        })))
        .mount(server)
        .await;
}

/// STK push endpoint that always accepts.
#[allow(dead_code)]
pub async fn mount_stk_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(STK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(stk_ack()))
        .mount(server)
        .await;
}

/// Number of requests the mock provider received on `request_path`.
#[allow(dead_code)]
pub async fn hits(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
