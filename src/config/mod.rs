//! Configuration structures and loading utilities.
//!
//! Every value is read once from the environment at process start and
//! handed to constructors explicitly; nothing here is hot-reloaded.

pub mod counterpart;
pub mod error;
pub mod server;
pub mod signing;

pub use counterpart::*;
pub use error::*;
pub use server::*;
pub use signing::*;
