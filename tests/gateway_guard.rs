//! Guard behaviour against a mock Daraja provider.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use wiremock::matchers::{basic_auth, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mpesa_guard::resilience::CircuitState;
use mpesa_guard::{ErrorKind, ExternalReason, GuardError, PaymentGateway, PaymentRequest};

mod common;

fn request(amount: f64) -> PaymentRequest {
    PaymentRequest {
        payer_phone: "0712 345 678".into(),
        amount,
        account_reference: "INV-001".into(),
        transaction_desc: Some("Order 1".into()),
    }
}

#[tokio::test]
async fn test_payment_sends_expected_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(common::TOKEN_PATH))
        .and(basic_auth("consumer-key", "consumer-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": common::ACCESS_TOKEN,
            "expires_in": "3599"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(common::STK_PATH))
        .and(header("authorization", format!("Bearer {}", common::ACCESS_TOKEN).as_str()))
        .and(body_partial_json(json!({
            "BusinessShortCode": "174379",
            "TransactionType": "CustomerPayBillOnline",
            "Amount": 150,
            "PartyA": "254712345678",
            "PartyB": "174379",
            "PhoneNumber": "254712345678",
            "CallBackURL": "https://shop.example.com/mpesa/callback",
            "AccountReference": "INV-001",
            "TransactionDesc": "Order 1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::stk_ack()))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = PaymentGateway::from_config(&common::guard_config(&server.uri())).unwrap();
    let ack = gateway.initiate_payment(&request(149.5)).await.unwrap();

    assert!(ack.is_accepted());
    assert_eq!(ack.checkout_request_id, "ws_CO_191220191020363925");

    let requests = server.received_requests().await.unwrap();
    let push = requests
        .iter()
        .find(|r| r.url.path() == common::STK_PATH)
        .unwrap();
    let body: Value = serde_json::from_slice(&push.body).unwrap();
    let timestamp = body["Timestamp"].as_str().unwrap();
    let password = BASE64.decode(body["Password"].as_str().unwrap()).unwrap();
    assert_eq!(timestamp.len(), 14);
    assert_eq!(
        String::from_utf8(password).unwrap(),
        format!("174379test-passkey{}", timestamp)
    );

    let health = gateway.health();
    assert!(health.healthy);
    assert_eq!(health.metrics.successful_requests, 1);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    common::mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path(common::STK_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "requestId": "11728-2929992-1",
            "errorCode": "400.002.02",
            "errorMessage": "Bad Request - Invalid PhoneNumber"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = PaymentGateway::from_config(&common::guard_config(&server.uri())).unwrap();
    let err = gateway.initiate_payment(&request(10.0)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExternalService);
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("Invalid PhoneNumber"));
    match err {
        GuardError::ExternalService {
            attempts,
            reason: ExternalReason::Status { status, .. },
            ..
        } => {
            assert_eq!(attempts, 1);
            assert_eq!(status, 400);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_server_errors_retried_until_success() {
    let server = MockServer::start().await;
    common::mount_token(&server).await;

    Mock::given(method("POST"))
        .and(path(common::STK_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    common::mount_stk_ok(&server).await;

    let gateway = PaymentGateway::from_config(&common::guard_config(&server.uri())).unwrap();
    let ack = gateway.initiate_payment(&request(10.0)).await.unwrap();

    assert!(ack.is_accepted());
    assert_eq!(common::hits(&server, common::STK_PATH).await, 3);
    assert_eq!(common::hits(&server, common::TOKEN_PATH).await, 1);

    let usage = gateway.health().metrics;
    assert_eq!(usage.total_requests, 1);
    assert_eq!(usage.successful_requests, 1);
    assert_eq!(usage.failed_requests, 0);
}

#[tokio::test]
async fn test_breaker_opens_after_exhausted_operations() {
    let server = MockServer::start().await;
    common::mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(common::STK_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = common::guard_config(&server.uri());
    config.circuit_breaker.failure_threshold = 2;
    config.retries.payment.max_retries = 2;
    let gateway = PaymentGateway::from_config(&config).unwrap();

    for _ in 0..2 {
        let err = gateway.initiate_payment(&request(10.0)).await.unwrap_err();
        assert!(matches!(err, GuardError::ExternalService { attempts: 2, .. }));
    }
    assert_eq!(common::hits(&server, common::STK_PATH).await, 4);
    assert_eq!(gateway.health().circuit_breaker.state, CircuitState::Open);

    let err = gateway.initiate_payment(&request(10.0)).await.unwrap_err();
    assert_eq!(err.reason(), Some(&ExternalReason::CircuitOpen));
    assert_eq!(common::hits(&server, common::STK_PATH).await, 4);
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    common::mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(common::STK_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::stk_ack())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let mut config = common::guard_config(&server.uri());
    config.timeouts.request_ms = 50;
    config.retries.payment.max_retries = 2;
    let gateway = PaymentGateway::from_config(&config).unwrap();

    let err = gateway.initiate_payment(&request(10.0)).await.unwrap_err();
    assert_eq!(err.reason(), Some(&ExternalReason::Timeout(Duration::from_millis(50))));
    assert_eq!(common::hits(&server, common::STK_PATH).await, 2);
    assert_eq!(gateway.health().metrics.failed_requests, 1);
}

#[tokio::test]
async fn test_rejected_response_code_not_retried() {
    let server = MockServer::start().await;
    common::mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(common::STK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MerchantRequestID": "1",
            "CheckoutRequestID": "2",
            "ResponseCode": "1",
            "ResponseDescription": "Rejected by system"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = PaymentGateway::from_config(&common::guard_config(&server.uri())).unwrap();
    let err = gateway.initiate_payment(&request(10.0)).await.unwrap_err();
    assert!(matches!(err.reason(), Some(ExternalReason::Rejected { code, .. }) if code == "1"));
}

#[tokio::test]
async fn test_token_failure_surfaces_external_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = PaymentGateway::from_config(&common::guard_config(&server.uri())).unwrap();
    let err = gateway.acquire_access_token().await.unwrap_err();

    assert!(err.to_string().starts_with("acquire_access_token failed after 1 attempt(s)"));
    assert!(matches!(
        err.reason(),
        Some(ExternalReason::Status { status: 401, .. })
    ));
    let health = gateway.health();
    assert_eq!(health.metrics.failed_requests, 1);
    assert_eq!(health.circuit_breaker.failure_count, 1);
}

#[tokio::test]
async fn test_token_fetch_retried_with_token_policy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(common::TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gateway = PaymentGateway::from_config(&common::guard_config(&server.uri())).unwrap();
    let err = gateway.acquire_access_token().await.unwrap_err();

    assert!(matches!(err, GuardError::ExternalService { attempts: 2, .. }));
    assert_eq!(common::hits(&server, common::TOKEN_PATH).await, 2);
}

#[tokio::test]
async fn test_validation_makes_no_network_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(common::STK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::stk_ack()))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = PaymentGateway::from_config(&common::guard_config(&server.uri())).unwrap();
    for amount in [0.0, -250.0] {
        let err = gateway.initiate_payment(&request(amount)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}
