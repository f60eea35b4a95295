//! Reward Relay - HMAC-signed reward sync between an issuer and a commerce platform
//!
//! The issuer verifies a proof, then relays the earned reward to the commerce
//! platform as a signed webhook. The commerce side authenticates the request,
//! enforces a replay window, and credits each transaction id exactly once.
//!
//! ## Architecture
//!
//! - `utils/` - canonical JSON, HMAC signing primitives, HTTP header helpers
//! - `services/` - signer, verifier, idempotency store, ledger, transport, sync orchestration
//! - `handlers/` - HTTP endpoints and the per-role app factories
//! - `middleware/` - request ids and request metrics
//! - `models/` - wire types, API models, audit events
//! - `config/` - environment-driven configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use reward_relay::{
//!     CounterpartConfig, HttpTransport, RewardSync, SharedSecret, Signer,
//!     WELLNESS_JOURNAL_ENTRY,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let signer = Signer::new(SharedSecret::new("shared-secret")?);
//! let transport = HttpTransport::new(&CounterpartConfig::default(), None)?;
//! let sync = RewardSync::new(signer, Arc::new(transport));
//!
//! let ack = sync.sync("0xabc", 10, WELLNESS_JOURNAL_ENTRY).await?;
//! println!("{} {:?}", ack.transaction_id, ack.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{
    CircuitBreakerConfig, ConfigError, CounterpartConfig, Role, ServerConfig, SharedSecret,
    SigningConfig,
};
pub use handlers::{
    CommerceState, IssuerState, create_commerce_app, create_issuer_app, create_openapi_spec,
};
pub use middleware::{MetricsMiddleware, RequestIdMiddleware};
pub use models::{
    ErrorCode, RewardEvent, SignedEnvelope, SyncAcknowledgement, SyncResponse, SyncStatus,
    WELLNESS_JOURNAL_ENTRY,
};
pub use services::{
    AppMetrics, HttpTransport, IdempotencyStore, InMemoryIdempotencyStore, InMemoryRewardLedger,
    LedgerError, NonEmptyProofVerifier, ProofVerifier, Reservation, RewardLedger, RewardSync,
    Signer, SigningError, StoreError, SyncError, SyncRecord, Transport, TransportError,
    TransportMetrics, VerificationError, VerificationOutcome, Verifier, WalletRegistry,
};
pub use utils::{EncodingError, canonicalize, generate_signature, verify_signature};
