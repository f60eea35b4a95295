//! Outbound delivery against a mock commerce counterpart.

use prometheus::Registry;
use reward_relay::{
    CircuitBreakerConfig, CounterpartConfig, ErrorCode, HttpTransport, RewardEvent, RewardSync,
    SharedSecret, Signer, SyncError, SyncStatus, Transport, TransportError, TransportMetrics,
    canonicalize, services::CircuitState, verify_signature,
};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use wiremock::{
    Match, Mock, MockServer, Request, ResponseTemplate,
    matchers::{header, method, path},
};

const SYNC_PATH: &str = "/api/v1/nebula/sync-rewards";

/// Matches only requests whose headers carry a valid signature over the body
struct ValidSignature {
    secret: &'static str,
}

impl Match for ValidSignature {
    fn matches(&self, request: &Request) -> bool {
        let header_value = |name: &str| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let (Some(signature), Some(timestamp)) = (header_value("X-Signature"), header_value("X-Timestamp")) else {
            return false;
        };
        let Ok(timestamp) = timestamp.parse::<u64>() else {
            return false;
        };
        let Ok(event) = serde_json::from_slice::<RewardEvent>(&request.body) else {
            return false;
        };
        let Ok(canonical) = canonicalize(&event) else {
            return false;
        };

        verify_signature(self.secret.as_bytes(), &canonical, timestamp, &signature).unwrap_or(false)
    }
}

fn counterpart(server: &MockServer) -> CounterpartConfig {
    CounterpartConfig {
        request_timeout_seconds: 1,
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            open_seconds: 60,
        },
        ..CounterpartConfig::with_base_url(format!("{}/api/v1/nebula", server.uri()))
    }
}

fn reward_sync(transport: HttpTransport) -> RewardSync {
    RewardSync::new(Signer::new(SharedSecret::new("k").unwrap()), Arc::new(transport))
}

fn journal_event() -> RewardEvent {
    RewardEvent::with_transaction_id("t-1", "0xabc", 10, "wellness_journal_entry")
}

#[tokio::test]
async fn test_delivery_is_signed_patch() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(SYNC_PATH))
        .and(header("content-type", "application/json"))
        .and(ValidSignature { secret: "k" })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "applied",
            "transactionId": "t-1",
            "newBalance": 10,
            "appliedAt": "2023-11-14T22:13:20+00:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&counterpart(&server), None).unwrap();
    let ack = reward_sync(transport).sync_event(&journal_event()).await.unwrap();

    assert_eq!(ack.transaction_id, "t-1");
    assert_eq!(ack.status, SyncStatus::Applied);
    assert_eq!(ack.new_balance, Some(10));
}

#[tokio::test]
async fn test_duplicate_acknowledgement() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(SYNC_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "duplicate",
            "transactionId": "t-1",
            "newBalance": 10,
            "appliedAt": "2023-11-14T22:13:20+00:00"
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&counterpart(&server), None).unwrap();
    let ack = reward_sync(transport).sync_event(&journal_event()).await.unwrap();
    assert!(ack.is_duplicate());
}

#[tokio::test]
async fn test_structured_rejection_becomes_remote_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(SYNC_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": "rejected",
            "error": "signature_mismatch",
            "message": "signature does not match payload"
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&counterpart(&server), None).unwrap();
    let err = reward_sync(transport).sync_event(&journal_event()).await.unwrap_err();

    match &err {
        SyncError::RemoteRejected { code, message, transaction_id } => {
            assert_eq!(*code, ErrorCode::SignatureMismatch);
            assert_eq!(message, "signature does not match payload");
            assert_eq!(transaction_id, "t-1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_retriable());
}

#[tokio::test]
async fn test_unstructured_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&counterpart(&server), None).unwrap();
    let err = transport
        .deliver(&Signer::new(SharedSecret::new("k").unwrap()).sign(journal_event()).unwrap())
        .await
        .unwrap_err();

    match err {
        TransportError::UnexpectedStatus { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "upstream down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_success_status_with_foreign_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&counterpart(&server), None).unwrap();
    let err = reward_sync(transport).sync_event(&journal_event()).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(TransportError::InvalidResponse(_))));
    assert!(!err.is_retriable());
}

#[tokio::test]
async fn test_slow_counterpart_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "applied"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&counterpart(&server), None).unwrap();
    let err = reward_sync(transport).sync_event(&journal_event()).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(TransportError::Timeout(_))));
    assert!(err.is_retriable());
}

#[tokio::test]
async fn test_unreachable_counterpart_is_network_error() {
    // Nothing listens on the discard port
    let config = CounterpartConfig::with_base_url("http://127.0.0.1:9/api/v1/nebula");
    let transport = HttpTransport::new(&config, None).unwrap();

    let err = reward_sync(transport).sync_event(&journal_event()).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(TransportError::Network(_))));
    assert!(err.is_retriable());
}

#[tokio::test]
async fn test_circuit_opens_after_consecutive_failures() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let registry = Registry::new();
    let metrics = TransportMetrics::new(&registry).unwrap();
    let transport = Arc::new(HttpTransport::new(&counterpart(&server), Some(metrics.clone())).unwrap());
    let sync = RewardSync::new(Signer::new(SharedSecret::new("k").unwrap()), transport.clone());

    for _ in 0..2 {
        let err = sync.sync_event(&journal_event()).await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(TransportError::UnexpectedStatus { status: 500, .. })));
    }
    assert_eq!(transport.circuit_state(), CircuitState::Open);

    let err = sync.sync_event(&journal_event()).await.unwrap_err();
    assert!(matches!(err, SyncError::Transport(TransportError::CircuitOpen(_))));

    // The open circuit never reached the counterpart
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);

    let destination = transport.endpoint().host_str().unwrap().to_string();
    assert_eq!(
        metrics
            .requests_total
            .with_label_values(&[destination.as_str(), "circuit_open"])
            .get(),
        1.0
    );
    assert_eq!(
        metrics
            .circuit_breaker_state
            .with_label_values(&[destination.as_str()])
            .get(),
        1.0
    );
}

#[tokio::test]
async fn test_retry_reuses_transaction_id_with_fresh_signature() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "duplicate",
            "transactionId": "t-1"
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&counterpart(&server), None).unwrap();
    let sync = reward_sync(transport);
    let event = journal_event();

    sync.sync_event(&event).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;
    sync.sync_event(&event).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);

    let bodies: Vec<RewardEvent> = received
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(bodies[0], bodies[1]);
    assert_ne!(
        received[0].headers.get("X-Timestamp"),
        received[1].headers.get("X-Timestamp")
    );
    assert_ne!(
        received[0].headers.get("X-Signature"),
        received[1].headers.get("X-Signature")
    );
}
