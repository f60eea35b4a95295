//! Audit logging for inbound sync verification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What happened to an inbound sync request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventType {
    Applied,
    Duplicate,
    MissingCredentials,
    SignatureMismatch,
    ReplayWindowExceeded,
    EncodingError,
    BusinessRejection,
    InternalError,
}

impl SyncEventType {
    /// Label used for the verification outcome metric
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEventType::Applied => "applied",
            SyncEventType::Duplicate => "duplicate",
            SyncEventType::MissingCredentials => "missing_credentials",
            SyncEventType::SignatureMismatch => "signature_mismatch",
            SyncEventType::ReplayWindowExceeded => "replay_window_exceeded",
            SyncEventType::EncodingError => "encoding_error",
            SyncEventType::BusinessRejection => "business_rejection",
            SyncEventType::InternalError => "internal_error",
        }
    }

    /// Authentication failures are worth a warning: they indicate tampering or
    /// a secret/clock misconfiguration between the two services.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            SyncEventType::MissingCredentials
                | SyncEventType::SignatureMismatch
                | SyncEventType::ReplayWindowExceeded
        )
    }
}

/// Structured audit log entry for an inbound sync request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncAuditEvent {
    pub event_type: SyncEventType,
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
    pub transaction_id: Option<String>,
    pub subject_id: Option<String>,
    pub reason: Option<String>,
}

impl SyncAuditEvent {
    pub fn new(event_type: SyncEventType, ip_address: String) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            ip_address,
            user_agent: None,
            request_id: None,
            transaction_id: None,
            subject_id: None,
            reason: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Attach the transaction and subject of the event under verification
    pub fn with_event(mut self, transaction_id: &str, subject_id: &str) -> Self {
        self.transaction_id = Some(transaction_id.to_string());
        self.subject_id = Some(subject_id.to_string());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Emit the event on the `sync_audit` target
    pub fn log(&self) {
        if self.event_type.is_authentication_failure() {
            warn!(
                target: "sync_audit",
                event_type = self.event_type.as_str(),
                timestamp = %self.timestamp,
                ip_address = %self.ip_address,
                user_agent = ?self.user_agent,
                request_id = ?self.request_id,
                transaction_id = ?self.transaction_id,
                subject_id = ?self.subject_id,
                reason = ?self.reason,
                "Rejected unauthenticated sync request"
            );
        } else {
            info!(
                target: "sync_audit",
                event_type = self.event_type.as_str(),
                timestamp = %self.timestamp,
                ip_address = %self.ip_address,
                user_agent = ?self.user_agent,
                request_id = ?self.request_id,
                transaction_id = ?self.transaction_id,
                subject_id = ?self.subject_id,
                reason = ?self.reason,
                "Sync audit event"
            );
        }
    }
}
