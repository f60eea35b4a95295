//! Custom middleware implementations for the API.
//!
//! Request ids and request metrics, shared by both roles.

pub mod metrics;
pub mod request_id;

pub use metrics::*;
pub use request_id::*;
