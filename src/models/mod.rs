//! Data models for the reward relay.
//!
//! Wire types of the sync protocol, HTTP request/response bodies and the
//! audit event emitted on every inbound verification.

pub mod api;
pub mod audit;
pub mod event;
pub mod response;

pub use api::*;
pub use audit::*;
pub use event::*;
pub use response::*;
