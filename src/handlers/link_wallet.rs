//! Commerce endpoint registering wallets that may receive synced rewards.

use crate::{
    models::{ErrorResponse, LinkWalletRequest, LinkWalletResponse},
    services::ledger::{LedgerError, WalletRegistry},
    utils::http::{extract_client_ip, extract_request_id},
};
use actix_web::{Error, HttpRequest, HttpResponse, Result, web};
use paperclip::actix::api_v2_operation;
use tracing::{error, info};

/// Link a wallet
///
/// Rewards synced to an unlinked wallet are rejected as `business_rejection`.
#[api_v2_operation(
    summary = "Link Wallet",
    description = "Registers a wallet address with the commerce ledger so signed reward syncs can be applied to it. \
                   Linking an already linked wallet keeps its balance.",
    tags("Wallets"),
    responses(
        (status = 200, description = "Wallet linked", body = LinkWalletResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 422, description = "Malformed wallet address", body = ErrorResponse)
    )
)]
pub async fn link_wallet(
    req: HttpRequest,
    payload: web::Json<LinkWalletRequest>,
) -> Result<HttpResponse, Error> {
    let registry = req
        .app_data::<web::Data<dyn WalletRegistry>>()
        .ok_or_else(|| actix_web::error::ErrorServiceUnavailable("Wallet registry not configured"))?;
    let wallet_address = payload.into_inner().wallet_address;

    match registry.link(&wallet_address).await {
        Ok(balance) => {
            info!(
                wallet_address = %wallet_address,
                balance,
                ip_address = %extract_client_ip(&req),
                request_id = ?extract_request_id(&req),
                "Wallet linked"
            );
            Ok(HttpResponse::Ok().json(LinkWalletResponse {
                status: "linked".to_string(),
                wallet_address,
                balance,
            }))
        }
        Err(LedgerError::InvalidSubject) => Ok(HttpResponse::UnprocessableEntity()
            .json(ErrorResponse::new("invalid_wallet", "Malformed wallet address"))),
        Err(err) => {
            error!(wallet_address = %wallet_address, error = %err, "Wallet link failed");
            Ok(HttpResponse::InternalServerError()
                .json(ErrorResponse::new("internal_error", "Wallet could not be linked")))
        }
    }
}
