//! Response contract of the sync endpoint.

use crate::services::idempotency::SyncRecord;
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status discriminator of a sync response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Applied,
    Duplicate,
    Rejected,
}

/// Error codes carried by a `rejected` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The payload could not be canonicalized
    EncodingError,
    /// Missing, malformed or wrong signature
    SignatureMismatch,
    /// Timestamp outside the verifier's replay window
    ReplayWindowExceeded,
    /// Authenticated, but refused by the commerce side's business rules
    BusinessRejection,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EncodingError => "encoding_error",
            ErrorCode::SignatureMismatch => "signature_mismatch",
            ErrorCode::ReplayWindowExceeded => "replay_window_exceeded",
            ErrorCode::BusinessRejection => "business_rejection",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned by the sync endpoint for every outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Subject balance right after the event was applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<u64>,
    /// RFC 3339 time of the original application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncResponse {
    pub fn applied(record: &SyncRecord) -> Self {
        Self::from_record(SyncStatus::Applied, record)
    }

    /// A replay of `record`; carries exactly the result of the first application
    pub fn duplicate(record: &SyncRecord) -> Self {
        Self::from_record(SyncStatus::Duplicate, record)
    }

    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Rejected,
            transaction_id: None,
            new_balance: None,
            applied_at: None,
            error: Some(code),
            message: Some(message.into()),
        }
    }

    fn from_record(status: SyncStatus, record: &SyncRecord) -> Self {
        Self {
            status,
            transaction_id: Some(record.transaction_id.clone()),
            new_balance: Some(record.new_balance),
            applied_at: Some(record.applied_at.to_rfc3339()),
            error: None,
            message: None,
        }
    }
}

/// What the issuer's caller gets back from a successful sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct SyncAcknowledgement {
    pub transaction_id: String,
    /// `applied` on first delivery, `duplicate` when the counterpart had already applied it
    pub status: SyncStatus,
    pub new_balance: Option<u64>,
    pub applied_at: Option<String>,
}

impl SyncAcknowledgement {
    pub fn is_duplicate(&self) -> bool {
        self.status == SyncStatus::Duplicate
    }
}
