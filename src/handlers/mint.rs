//! Issuer endpoint: verify a submitted proof and sync the earned reward to
//! the commerce counterpart.

use crate::{
    models::{ErrorResponse, MintRequest, MintResponse, WELLNESS_JOURNAL_ENTRY},
    services::{
        proof::ProofVerifier,
        sync::{RewardSync, SyncError},
    },
    utils::http::{extract_client_ip, extract_request_id},
};
use actix_web::{
    Error, HttpRequest, HttpResponse, Result, error::InternalError, error::JsonPayloadError, web,
};
use paperclip::actix::api_v2_operation;
use tracing::{info, warn};

/// Verify a proof and mint its reward
///
/// The reward is relayed to the commerce side as a signed sync under a fresh
/// transaction id.
#[api_v2_operation(
    summary = "Verify And Mint",
    description = "Checks the submitted proof, then syncs the reward to the commerce platform as an HMAC-signed event.",
    tags("Mint"),
    responses(
        (status = 200, description = "Proof accepted and reward synced", body = MintResponse),
        (status = 400, description = "Invalid proof or unencodable reward", body = ErrorResponse),
        (status = 409, description = "Commerce platform rejected the sync", body = ErrorResponse),
        (status = 502, description = "Commerce platform unreachable or misbehaving", body = ErrorResponse)
    )
)]
pub async fn verify_and_mint(
    req: HttpRequest,
    payload: web::Json<MintRequest>,
) -> Result<HttpResponse, Error> {
    let reward_sync = req
        .app_data::<web::Data<RewardSync>>()
        .ok_or_else(|| actix_web::error::ErrorServiceUnavailable("Reward sync not configured"))?;
    let proof_verifier = req
        .app_data::<web::Data<dyn ProofVerifier>>()
        .ok_or_else(|| actix_web::error::ErrorServiceUnavailable("Proof verifier not configured"))?;
    let request = payload.into_inner();

    if !proof_verifier.verify(&request.proof_data) {
        warn!(
            wallet_address = %request.wallet_address,
            ip_address = %extract_client_ip(&req),
            request_id = ?extract_request_id(&req),
            "Proof rejected"
        );
        return Ok(HttpResponse::BadRequest()
            .json(ErrorResponse::new("invalid_proof", "Proof verification failed")));
    }

    match reward_sync
        .sync(&request.wallet_address, request.reward_amount, WELLNESS_JOURNAL_ENTRY)
        .await
    {
        Ok(ack) => {
            info!(
                wallet_address = %request.wallet_address,
                transaction_id = %ack.transaction_id,
                request_id = ?extract_request_id(&req),
                "Reward minted"
            );
            Ok(HttpResponse::Ok().json(MintResponse {
                status: "success".to_string(),
                sync: ack,
            }))
        }
        Err(err) => Ok(sync_failure(&err)),
    }
}

fn sync_failure(err: &SyncError) -> HttpResponse {
    match err {
        SyncError::Encoding(_) => HttpResponse::BadRequest()
            .json(ErrorResponse::new("encoding_error", err.to_string())),
        SyncError::RemoteRejected { code, message, .. } => {
            HttpResponse::Conflict().json(ErrorResponse::new(code.as_str(), message.as_str()))
        }
        SyncError::Transport(_) => HttpResponse::BadGateway()
            .json(ErrorResponse::new("transport_error", err.to_string())),
        SyncError::ProtocolViolation(_) => HttpResponse::BadGateway()
            .json(ErrorResponse::new("protocol_violation", err.to_string())),
        SyncError::Signing(_) => HttpResponse::InternalServerError()
            .json(ErrorResponse::new("internal_error", "Reward could not be signed")),
    }
}

/// Renders malformed request bodies as an `invalid_request` [`ErrorResponse`]
pub fn invalid_request_handler(err: JsonPayloadError, _req: &HttpRequest) -> Error {
    let response =
        HttpResponse::BadRequest().json(ErrorResponse::new("invalid_request", err.to_string()));
    InternalError::from_response(err, response).into()
}
