//! Issuer-side orchestration of one sync attempt: build the event, sign it,
//! deliver it and interpret the counterpart's answer.

use crate::{
    models::{ErrorCode, RewardEvent, SyncAcknowledgement, SyncResponse, SyncStatus},
    services::{
        metrics::AppMetrics,
        signer::{Signer, SigningError},
        transport::{Transport, TransportError},
    },
    utils::canonical::EncodingError,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Encoding(EncodingError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("counterpart rejected {transaction_id}: {code}: {message}")]
    RemoteRejected {
        code: ErrorCode,
        message: String,
        transaction_id: String,
    },

    #[error("signing failed: {0}")]
    Signing(SigningError),

    #[error("counterpart broke the sync contract: {0}")]
    ProtocolViolation(String),
}

impl From<SigningError> for SyncError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::Encoding(e) => SyncError::Encoding(e),
            other => SyncError::Signing(other),
        }
    }
}

impl SyncError {
    /// Whether calling [`RewardSync::sync_event`] again with the same event can succeed.
    ///
    /// Transport failures and a stale timestamp qualify; authentication and
    /// business rejections would fail identically.
    pub fn is_retriable(&self) -> bool {
        match self {
            SyncError::Transport(err) => !matches!(
                err,
                TransportError::InvalidUrl(_) | TransportError::InvalidResponse(_)
            ),
            SyncError::RemoteRejected { code, .. } => *code == ErrorCode::ReplayWindowExceeded,
            SyncError::Encoding(_) | SyncError::Signing(_) | SyncError::ProtocolViolation(_) => {
                false
            }
        }
    }

    /// Protocol error code, when the failure has one
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            SyncError::Encoding(_) => Some(ErrorCode::EncodingError),
            SyncError::RemoteRejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            SyncError::Encoding(_) => "encoding_error",
            SyncError::Transport(_) => "transport_error",
            SyncError::RemoteRejected { .. } => "remote_rejected",
            SyncError::Signing(_) => "signing_error",
            SyncError::ProtocolViolation(_) => "protocol_violation",
        }
    }
}

/// Drives sync attempts from the issuer to the commerce counterpart
pub struct RewardSync {
    signer: Signer,
    transport: Arc<dyn Transport>,
    metrics: Option<AppMetrics>,
}

impl RewardSync {
    pub fn new(signer: Signer, transport: Arc<dyn Transport>) -> Self {
        Self {
            signer,
            transport,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: AppMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sync a new event under a freshly generated transaction id
    pub async fn sync(
        &self,
        subject_id: &str,
        quantity: u64,
        action_type: &str,
    ) -> Result<SyncAcknowledgement, SyncError> {
        let event = RewardEvent::new(subject_id, quantity, action_type);
        self.sync_event(&event).await
    }

    /// Sign `event` now and deliver it.
    ///
    /// This is also the retry path: calling it again with the same event
    /// reuses the transaction id, so the counterpart applies it at most once.
    pub async fn sync_event(&self, event: &RewardEvent) -> Result<SyncAcknowledgement, SyncError> {
        let result = self.attempt(event).await;

        let outcome = match &result {
            Ok(ack) if ack.is_duplicate() => "duplicate",
            Ok(_) => "applied",
            Err(err) => err.outcome(),
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_outbound(outcome);
        }

        match &result {
            Ok(ack) => info!(
                transaction_id = %ack.transaction_id,
                subject_id = %event.subject_id,
                quantity = event.quantity,
                outcome,
                "Reward sync acknowledged"
            ),
            Err(err) => warn!(
                transaction_id = %event.transaction_id,
                subject_id = %event.subject_id,
                outcome,
                retriable = err.is_retriable(),
                error = %err,
                "Reward sync failed"
            ),
        }

        result
    }

    async fn attempt(&self, event: &RewardEvent) -> Result<SyncAcknowledgement, SyncError> {
        let envelope = self.signer.sign(event.clone())?;
        let response = self.transport.deliver(&envelope).await?;
        interpret(event, response)
    }
}

fn interpret(event: &RewardEvent, response: SyncResponse) -> Result<SyncAcknowledgement, SyncError> {
    if let Some(echoed) = response.transaction_id.as_deref() {
        if echoed != event.transaction_id {
            return Err(SyncError::ProtocolViolation(format!(
                "response for {echoed} while syncing {}",
                event.transaction_id
            )));
        }
    }

    match response.status {
        SyncStatus::Applied | SyncStatus::Duplicate => Ok(SyncAcknowledgement {
            transaction_id: event.transaction_id.clone(),
            status: response.status,
            new_balance: response.new_balance,
            applied_at: response.applied_at,
        }),
        SyncStatus::Rejected => {
            let code = response.error.ok_or_else(|| {
                SyncError::ProtocolViolation("rejected response without an error code".to_string())
            })?;
            Err(SyncError::RemoteRejected {
                code,
                message: response.message.unwrap_or_default(),
                transaction_id: event.transaction_id.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SharedSecret, models::SignedEnvelope, utils::canonical::MAX_CANONICAL_QUANTITY};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a canned answer and keeps every envelope it was handed
    struct ScriptedTransport {
        reply: Box<dyn Fn(&SignedEnvelope) -> Result<SyncResponse, TransportError> + Send + Sync>,
        sent: Mutex<Vec<SignedEnvelope>>,
    }

    impl ScriptedTransport {
        fn new(
            reply: impl Fn(&SignedEnvelope) -> Result<SyncResponse, TransportError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                reply: Box::new(reply),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<SignedEnvelope> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn deliver(&self, envelope: &SignedEnvelope) -> Result<SyncResponse, TransportError> {
            self.sent.lock().unwrap().push(envelope.clone());
            (self.reply)(envelope)
        }
    }

    fn applied(envelope: &SignedEnvelope, status: SyncStatus) -> SyncResponse {
        SyncResponse {
            status,
            transaction_id: Some(envelope.payload.transaction_id.clone()),
            new_balance: Some(envelope.payload.quantity),
            applied_at: Some("2023-11-14T22:13:20+00:00".to_string()),
            error: None,
            message: None,
        }
    }

    fn reward_sync(transport: Arc<ScriptedTransport>) -> RewardSync {
        RewardSync::new(Signer::new(SharedSecret::new("k").unwrap()), transport)
    }

    #[tokio::test]
    async fn test_sync_generates_fresh_transaction_ids() {
        let transport = ScriptedTransport::new(|env| Ok(applied(env, SyncStatus::Applied)));
        let sync = reward_sync(transport.clone());

        let first = sync.sync("0xabc", 10, "wellness_journal_entry").await.unwrap();
        let second = sync.sync("0xabc", 10, "wellness_journal_entry").await.unwrap();

        assert_ne!(first.transaction_id, second.transaction_id);
        assert_eq!(first.status, SyncStatus::Applied);
        assert_eq!(first.new_balance, Some(10));

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].payload.transaction_id, first.transaction_id);
    }

    #[tokio::test]
    async fn test_sync_event_reuses_transaction_id() {
        let transport = ScriptedTransport::new(|env| Ok(applied(env, SyncStatus::Duplicate)));
        let sync = reward_sync(transport.clone());
        let event = RewardEvent::with_transaction_id("t-1", "0xabc", 10, "wellness_journal_entry");

        let ack = sync.sync_event(&event).await.unwrap();
        assert!(ack.is_duplicate());
        assert_eq!(ack.transaction_id, "t-1");
        assert_eq!(transport.sent()[0].payload, event);
    }

    #[tokio::test]
    async fn test_remote_rejection_surfaces_code() {
        let transport = ScriptedTransport::new(|_| {
            Ok(SyncResponse::rejected(ErrorCode::BusinessRejection, "wallet not found"))
        });
        let err = reward_sync(transport)
            .sync("0xdef", 10, "wellness_journal_entry")
            .await
            .unwrap_err();

        match &err {
            SyncError::RemoteRejected { code, message, .. } => {
                assert_eq!(*code, ErrorCode::BusinessRejection);
                assert_eq!(message, "wallet not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn test_stale_timestamp_rejection_is_retriable() {
        let transport = ScriptedTransport::new(|_| {
            Ok(SyncResponse::rejected(ErrorCode::ReplayWindowExceeded, "stale"))
        });
        let err = reward_sync(transport)
            .sync("0xabc", 10, "wellness_journal_entry")
            .await
            .unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(err.error_code(), Some(ErrorCode::ReplayWindowExceeded));
    }

    #[tokio::test]
    async fn test_transport_error_is_retriable() {
        let transport = ScriptedTransport::new(|_| {
            Err(TransportError::Timeout(std::time::Duration::from_secs(5)))
        });
        let err = reward_sync(transport)
            .sync("0xabc", 10, "wellness_journal_entry")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport(TransportError::Timeout(_))));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn test_encoding_error_never_reaches_transport() {
        let transport = ScriptedTransport::new(|env| Ok(applied(env, SyncStatus::Applied)));
        let err = reward_sync(transport.clone())
            .sync("0xabc", MAX_CANONICAL_QUANTITY + 1, "wellness_journal_entry")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Encoding(EncodingError::QuantityOutOfRange(_))));
        assert_eq!(err.error_code(), Some(ErrorCode::EncodingError));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_transaction_id_is_protocol_violation() {
        let transport = ScriptedTransport::new(|env| {
            let mut response = applied(env, SyncStatus::Applied);
            response.transaction_id = Some("someone-else".to_string());
            Ok(response)
        });
        let err = reward_sync(transport)
            .sync("0xabc", 10, "wellness_journal_entry")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn test_outbound_metrics_recorded() {
        let metrics = AppMetrics::new().unwrap();
        let transport = ScriptedTransport::new(|env| Ok(applied(env, SyncStatus::Applied)));
        let sync = reward_sync(transport).with_metrics(metrics.clone());

        sync.sync("0xabc", 10, "wellness_journal_entry").await.unwrap();
        assert_eq!(
            metrics.outbound_total.with_label_values(&["applied"]).get(),
            1.0
        );
    }
}
