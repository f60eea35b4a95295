//! Shared-secret and replay-window configuration for request signing.

use super::ConfigError;
use std::{env, fmt, sync::Arc};

/// Default tolerance between the signing timestamp and the verifier's clock
pub const DEFAULT_MAX_SKEW_SECONDS: u64 = 300;

/// HMAC key shared out-of-band between the issuer and the commerce service.
///
/// `Debug` output is redacted.
#[derive(Clone)]
pub struct SharedSecret(Arc<[u8]>);

impl SharedSecret {
    /// Wrap a secret value, rejecting empty keys
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        let bytes = secret.as_ref();
        if bytes.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        Ok(Self(Arc::from(bytes)))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Configuration shared by the signer and the verifier
#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub secret: SharedSecret,
    pub max_skew_seconds: u64,
}

impl SigningConfig {
    pub fn new(secret: SharedSecret) -> Self {
        Self {
            secret,
            max_skew_seconds: DEFAULT_MAX_SKEW_SECONDS,
        }
    }

    pub fn with_max_skew_seconds(mut self, max_skew_seconds: u64) -> Self {
        self.max_skew_seconds = max_skew_seconds;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `RELAY_SHARED_SECRET` is mandatory and has no fallback.
    /// `RELAY_MAX_SKEW_SECONDS` defaults to 300.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = env::var("RELAY_SHARED_SECRET")
            .map_err(|_| ConfigError::Missing("RELAY_SHARED_SECRET"))?;

        let max_skew_seconds = match env::var("RELAY_MAX_SKEW_SECONDS") {
            Ok(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                name: "RELAY_MAX_SKEW_SECONDS",
                reason: format!("{e}"),
            })?,
            Err(_) => DEFAULT_MAX_SKEW_SECONDS,
        };

        Ok(Self {
            secret: SharedSecret::new(secret)?,
            max_skew_seconds,
        })
    }
}
