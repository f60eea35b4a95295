//! OpenAPI specification generation and app factories for both roles.

use crate::{
    config::ServerConfig,
    handlers::{
        get_metrics, health, invalid_request_handler, link_wallet, sync_json_error_handler,
        sync_rewards, verify_and_mint, version,
    },
    middleware::{MetricsMiddleware, RequestIdMiddleware},
    services::{AppMetrics, ProofVerifier, RewardSync, Verifier, WalletRegistry},
};
use actix_web::{App, web::JsonConfig};
use paperclip::actix::{OpenApiExt, web};
use paperclip::v2::models::{DefaultApiRaw, Info};

/// Route the issuer exposes to the frontend
pub const MINT_ROUTE: &str = "/api/v1/nebula/verify-and-mint";

/// Route the commerce side registers wallets on
pub const LINK_WALLET_ROUTE: &str = "/api/integration/link-wallet";

/// Creates the shared OpenAPI specification for the API
pub fn create_openapi_spec() -> DefaultApiRaw {
    DefaultApiRaw {
        info: Info {
            title: "Reward Relay".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: Some(
                "Relays earned rewards from the issuing identity service to the commerce platform.\n\n\
                ## Signed sync requests\n\
                Every sync carries two headers:\n\
                - `X-Signature`: lowercase hex HMAC-SHA256\n\
                - `X-Timestamp`: Unix timestamp (seconds since epoch)\n\
                \n\
                **Signature calculation:**\n\
                1. Canonicalize the body: compact JSON, keys in the order `actionType`, `quantity`, `subjectId`, `transactionId`\n\
                2. Create message: `{timestamp}.{canonical body}`\n\
                3. Calculate HMAC-SHA256 using the shared secret and hex-encode it\n\
                \n\
                Requests more than `RELAY_MAX_SKEW_SECONDS` (default 300) away from server time are rejected. \
                A repeated `transactionId` returns the originally recorded result with status `duplicate`.".into()
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Shared handles for the commerce-side app
#[derive(Clone)]
pub struct CommerceState {
    pub server: web::Data<ServerConfig>,
    pub verifier: web::Data<Verifier>,
    /// Usually the same ledger the verifier credits
    pub wallets: web::Data<dyn WalletRegistry>,
    pub metrics: web::Data<AppMetrics>,
}

/// Shared handles for the issuer-side app
#[derive(Clone)]
pub struct IssuerState {
    pub server: web::Data<ServerConfig>,
    pub reward_sync: web::Data<RewardSync>,
    pub proof_verifier: web::Data<dyn ProofVerifier>,
    pub metrics: web::Data<AppMetrics>,
}

/// Creates the commerce app: the signed sync endpoint, wallet linking, plus
/// health, version, metrics and the OpenAPI document.
///
/// Called once per worker; the state handles are shared across workers.
pub fn create_commerce_app(
    state: CommerceState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let sync_route = state.server.sync_route.clone();

    App::new()
        .wrap(RequestIdMiddleware)
        .wrap(MetricsMiddleware)
        .wrap_api_with_spec(create_openapi_spec())
        .app_data(JsonConfig::default().error_handler(sync_json_error_handler))
        .app_data(state.server)
        .app_data(state.verifier)
        .app_data(state.wallets)
        .app_data(state.metrics)
        .service(web::resource(sync_route.as_str()).route(web::patch().to(sync_rewards)))
        .service(
            web::resource(LINK_WALLET_ROUTE)
                .app_data(JsonConfig::default().error_handler(invalid_request_handler))
                .route(web::post().to(link_wallet)),
        )
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/version").route(web::get().to(version)))
        .service(web::resource("/api/metrics").route(web::get().to(get_metrics)))
        .with_json_spec_at("/api/spec/v2")
        .build()
}

/// Creates the issuer app: verify-and-mint plus health, version, metrics,
/// and the OpenAPI document.
pub fn create_issuer_app(
    state: IssuerState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .wrap(RequestIdMiddleware)
        .wrap(MetricsMiddleware)
        .wrap_api_with_spec(create_openapi_spec())
        .app_data(JsonConfig::default().error_handler(invalid_request_handler))
        .app_data(state.server)
        .app_data(state.reward_sync)
        .app_data(state.proof_verifier)
        .app_data(state.metrics)
        .service(web::resource(MINT_ROUTE).route(web::post().to(verify_and_mint)))
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/version").route(web::get().to(version)))
        .service(web::resource("/api/metrics").route(web::get().to(get_metrics)))
        .with_json_spec_at("/api/spec/v2")
        .build()
}
