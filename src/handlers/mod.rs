//! HTTP request handlers for API endpoints.
//!
//! The commerce role serves `sync_rewards` and `link_wallet`; the issuer role serves
//! `verify_and_mint`. Health, version, and metrics are shared.

pub mod health;
pub mod link_wallet;
pub mod metrics;
pub mod mint;
pub mod openapi;
pub mod sync_rewards;
pub mod version;

pub use health::*;
pub use link_wallet::*;
pub use metrics::*;
pub use mint::*;
pub use openapi::*;
pub use sync_rewards::*;
pub use version::*;
