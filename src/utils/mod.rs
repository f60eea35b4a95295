//! Utility functions and helper modules.
//!
//! Protocol primitives (canonical encoding, HMAC) and HTTP request helpers.

pub mod canonical;
pub mod hmac;
pub mod http;

pub use self::canonical::*;
pub use self::hmac::*;
pub use self::http::*;
