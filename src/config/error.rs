//! Startup configuration errors.

/// Errors raised while loading configuration from the environment
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("shared secret must not be empty")]
    EmptySecret,

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
