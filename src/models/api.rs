//! API request/response models for the service endpoints.

use super::SyncAcknowledgement;
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

/// Response model for the health check endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct HealthResponse {
    pub status: String,
    /// `issuer` or `commerce`
    pub role: String,
}

/// Response model for the version information endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct VersionResponse {
    pub version: String,
    pub commit: String,
    pub build_time: String,
}

/// Proof submitted by the frontend to earn a reward
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub wallet_address: String,
    /// Opaque proof blob, checked by the configured proof verifier
    pub proof_data: String,
    pub reward_amount: u64,
}

/// Response model for a successful verify-and-mint call
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct MintResponse {
    pub status: String,
    /// Acknowledgement returned by the commerce counterpart
    pub sync: SyncAcknowledgement,
}

/// Error body for the issuer's endpoints
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct ErrorResponse {
    pub status: String,
    /// Machine-readable error kind, e.g. `invalid_proof` or a remote sync error code
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Request to register a wallet with the commerce ledger
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct LinkWalletRequest {
    pub wallet_address: String,
}

/// Response model for a linked wallet
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct LinkWalletResponse {
    pub status: String,
    pub wallet_address: String,
    /// Balance carried over if the wallet was already linked
    pub balance: u64,
}
