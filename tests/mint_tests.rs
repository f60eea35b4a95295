//! Issuer app tests: verify-and-mint against a mock counterpart, and a full
//! round trip into a running commerce server.

use actix_web::{HttpServer, http::StatusCode, test, web};
use reward_relay::{
    AppMetrics, CommerceState, CounterpartConfig, HttpTransport, InMemoryIdempotencyStore,
    InMemoryRewardLedger, IssuerState, ProofVerifier, RewardSync, ServerConfig, SharedSecret,
    Signer, SigningConfig, SyncStatus, Verifier, WalletRegistry, create_commerce_app,
    create_issuer_app, handlers::MINT_ROUTE,
};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn issuer_state(counterpart: &CounterpartConfig, secret: &str) -> IssuerState {
    let metrics = AppMetrics::new().unwrap();
    let transport = HttpTransport::new(counterpart, None).unwrap();
    let reward_sync = RewardSync::new(Signer::new(SharedSecret::new(secret).unwrap()), Arc::new(transport))
        .with_metrics(metrics.clone());
    let proof_verifier: Arc<dyn ProofVerifier> = Arc::new(|proof: &str| proof == "valid-proof");

    IssuerState {
        server: web::Data::new(ServerConfig {
            role: reward_relay::Role::Issuer,
            ..ServerConfig::default()
        }),
        reward_sync: web::Data::new(reward_sync),
        proof_verifier: web::Data::from(proof_verifier),
        metrics: web::Data::new(metrics),
    }
}

fn mint_request(wallet: &str, proof: &str) -> test::TestRequest {
    test::TestRequest::post().uri(MINT_ROUTE).set_json(json!({
        "walletAddress": wallet,
        "proofData": proof,
        "rewardAmount": 10
    }))
}

async fn mock_counterpart(status: u16, body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/nebula/sync-rewards"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn counterpart_at(server: &MockServer) -> CounterpartConfig {
    CounterpartConfig::with_base_url(format!("{}/api/v1/nebula", server.uri()))
}

#[actix_web::test]
async fn test_invalid_proof_is_rejected_before_sync() {
    let server = mock_counterpart(200, json!({"status": "applied"})).await;
    let app = test::init_service(create_issuer_app(issuer_state(&counterpart_at(&server), "k"))).await;

    let resp = test::call_service(&app, mint_request("0xabc", "forged").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_proof");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_mint_relays_acknowledgement() {
    let server = mock_counterpart(200, json!({"status": "applied", "newBalance": 10})).await;
    let app = test::init_service(create_issuer_app(issuer_state(&counterpart_at(&server), "k"))).await;

    let resp = test::call_service(&app, mint_request("0xabc", "valid-proof").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["sync"]["status"], "applied");
    assert_eq!(body["sync"]["newBalance"], 10);

    let received = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(sent["subjectId"], "0xabc");
    assert_eq!(sent["actionType"], "wellness_journal_entry");
    assert_eq!(body["sync"]["transactionId"], sent["transactionId"]);
}

#[actix_web::test]
async fn test_remote_rejection_is_conflict() {
    let server = mock_counterpart(
        404,
        json!({"status": "rejected", "error": "business_rejection", "message": "Wallet not found"}),
    )
    .await;
    let app = test::init_service(create_issuer_app(issuer_state(&counterpart_at(&server), "k"))).await;

    let resp = test::call_service(&app, mint_request("0xdef", "valid-proof").to_request()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "business_rejection");
    assert_eq!(body["message"], "Wallet not found");
}

#[actix_web::test]
async fn test_unreachable_counterpart_is_bad_gateway() {
    let config = CounterpartConfig::with_base_url("http://127.0.0.1:9/api/v1/nebula");
    let app = test::init_service(create_issuer_app(issuer_state(&config, "k"))).await;

    let resp = test::call_service(&app, mint_request("0xabc", "valid-proof").to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "transport_error");
}

#[actix_web::test]
async fn test_malformed_mint_body() {
    let config = CounterpartConfig::default();
    let app = test::init_service(create_issuer_app(issuer_state(&config, "k"))).await;

    let req = test::TestRequest::post()
        .uri(MINT_ROUTE)
        .set_json(json!({"walletAddress": "0xabc"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_request");
}

#[actix_web::test]
async fn test_round_trip_into_commerce_server() {
    let ledger = Arc::new(InMemoryRewardLedger::new().unwrap());
    ledger.link_wallet("0xabc").unwrap();
    let verifier = Verifier::new(
        &SigningConfig::new(SharedSecret::new("shared").unwrap()),
        Arc::new(InMemoryIdempotencyStore::new()),
        ledger.clone(),
    );
    let wallets: Arc<dyn WalletRegistry> = ledger.clone();
    let commerce = CommerceState {
        server: web::Data::new(ServerConfig::default()),
        verifier: web::Data::new(verifier),
        wallets: web::Data::from(wallets),
        metrics: web::Data::new(AppMetrics::new().unwrap()),
    };

    let http_server = HttpServer::new(move || create_commerce_app(commerce.clone()))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
    let addr = http_server.addrs()[0];
    let running = http_server.run();
    let handle = running.handle();
    actix_web::rt::spawn(running);

    let counterpart = CounterpartConfig::with_base_url(format!("http://{addr}/api/v1/nebula"));
    let transport = HttpTransport::new(&counterpart, None).unwrap();

    // Right secret: applied, then duplicate on retry
    let sync = RewardSync::new(Signer::new(SharedSecret::new("shared").unwrap()), Arc::new(transport));
    let event = reward_relay::RewardEvent::new("0xabc", 10, "wellness_journal_entry");
    let first = sync.sync_event(&event).await.unwrap();
    let retry = sync.sync_event(&event).await.unwrap();

    assert_eq!(first.status, SyncStatus::Applied);
    assert_eq!(retry.status, SyncStatus::Duplicate);
    assert_eq!(first.applied_at, retry.applied_at);
    assert_eq!(ledger.balance("0xabc"), Some(10));

    // Wrong secret: signature mismatch surfaces as a remote rejection
    let wrong = RewardSync::new(
        Signer::new(SharedSecret::new("other").unwrap()),
        Arc::new(HttpTransport::new(&counterpart, None).unwrap()),
    );
    let err = wrong.sync("0xabc", 10, "wellness_journal_entry").await.unwrap_err();
    assert_eq!(err.error_code(), Some(reward_relay::ErrorCode::SignatureMismatch));
    assert_eq!(ledger.balance("0xabc"), Some(10));

    handle.stop(true).await;
}
