use actix_web::{HttpServer, web};
use reward_relay::{
    AppMetrics, CommerceState, CounterpartConfig, HttpTransport, InMemoryIdempotencyStore,
    InMemoryRewardLedger, IssuerState, NonEmptyProofVerifier, ProofVerifier, RewardSync, Role,
    ServerConfig, Signer, SigningConfig, TransportMetrics, Verifier, WalletRegistry,
    create_commerce_app, create_issuer_app,
};
use std::{io, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // JSON logs; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server_config = ServerConfig::from_env().map_err(io::Error::other)?;
    let signing_config = SigningConfig::from_env().map_err(io::Error::other)?;
    let metrics = AppMetrics::new().map_err(io::Error::other)?;
    let bind_address = server_config.bind_address.clone();

    info!(
        role = %server_config.role,
        bind_address = %bind_address,
        max_skew_seconds = signing_config.max_skew_seconds,
        "Starting reward relay"
    );

    match server_config.role {
        Role::Commerce => {
            let ledger = Arc::new(InMemoryRewardLedger::new().map_err(io::Error::other)?);
            let verifier = Verifier::new(
                &signing_config,
                Arc::new(InMemoryIdempotencyStore::new()),
                ledger.clone(),
            );
            warn!("Using the in-memory ledger and idempotency store; state is lost on restart");
            let wallets: Arc<dyn WalletRegistry> = ledger;

            let state = CommerceState {
                server: web::Data::new(server_config),
                verifier: web::Data::new(verifier),
                wallets: web::Data::from(wallets),
                metrics: web::Data::new(metrics),
            };

            HttpServer::new(move || create_commerce_app(state.clone()))
                .bind(&bind_address)?
                .run()
                .await
        }
        Role::Issuer => {
            let counterpart = CounterpartConfig::from_env().map_err(io::Error::other)?;
            let transport_metrics =
                TransportMetrics::new(&metrics.registry).map_err(io::Error::other)?;
            let transport =
                HttpTransport::new(&counterpart, Some(transport_metrics)).map_err(io::Error::other)?;
            info!(endpoint = %transport.endpoint(), "Syncing rewards to commerce counterpart");

            let reward_sync = RewardSync::new(Signer::from_config(&signing_config), Arc::new(transport))
                .with_metrics(metrics.clone());

            warn!("No proof verifier configured; accepting any non-empty proof");
            let proof_verifier: Arc<dyn ProofVerifier> = Arc::new(NonEmptyProofVerifier);

            let state = IssuerState {
                server: web::Data::new(server_config),
                reward_sync: web::Data::new(reward_sync),
                proof_verifier: web::Data::from(proof_verifier),
                metrics: web::Data::new(metrics),
            };

            HttpServer::new(move || create_issuer_app(state.clone()))
                .bind(&bind_address)?
                .run()
                .await
        }
    }
}
