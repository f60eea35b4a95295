//! Protocol and service layer.
//!
//! The signer and sync orchestrator form the issuer side; the verifier with
//! its idempotency store and reward ledger form the commerce side.

pub mod circuit_breaker;
pub mod idempotency;
pub mod ledger;
pub mod metrics;
pub mod proof;
pub mod signer;
pub mod sync;
pub mod transport;
pub mod verifier;

pub use circuit_breaker::*;
pub use idempotency::*;
pub use ledger::*;
pub use metrics::*;
pub use proof::*;
pub use signer::*;
pub use sync::*;
pub use transport::*;
pub use verifier::*;
