//! Configuration for the outbound webhook to the commerce counterpart.
//!
//! Provides environment-based configuration for the HTTP transport with
//! defaults matching a local commerce service.

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

/// Where and how the issuer delivers signed reward events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterpartConfig {
    /// Base URL of the commerce service's integration API
    pub base_url: String,

    /// Path of the sync mutation, appended to `base_url`
    pub sync_path: String,

    /// Upper bound for a whole request, including reading the response body (in seconds)
    pub request_timeout_seconds: u64,

    /// Connection timeout (in seconds)
    pub connect_timeout_seconds: u64,

    pub circuit_breaker: CircuitBreakerConfig,

    /// Log every delivery attempt, not only failures
    pub enable_detailed_logging: bool,
}

/// Circuit breaker thresholds for the counterpart destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: usize,

    /// Successful probes needed to close a half-open circuit
    pub success_threshold: usize,

    /// Time an open circuit waits before letting a probe through (in seconds)
    pub open_seconds: u64,
}

impl Default for CounterpartConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001/api/v1/nebula".to_string(),
            sync_path: "/sync-rewards".to_string(),
            request_timeout_seconds: 5,
            connect_timeout_seconds: 3,
            circuit_breaker: CircuitBreakerConfig::default(),
            enable_detailed_logging: true,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_seconds: 30,
        }
    }
}

impl CounterpartConfig {
    /// Config pointing at `base_url` with every other value defaulted
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = env::var("RELAY_COUNTERPART_URL").unwrap_or(defaults.base_url);
        let sync_path = env::var("RELAY_SYNC_PATH").unwrap_or(defaults.sync_path);

        let request_timeout_seconds = env::var("RELAY_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_seconds);

        let connect_timeout_seconds = env::var("RELAY_CONNECT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.connect_timeout_seconds);

        let enable_detailed_logging = env::var("RELAY_DETAILED_LOGGING")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.enable_detailed_logging);

        let config = Self {
            base_url,
            sync_path,
            request_timeout_seconds,
            connect_timeout_seconds,
            circuit_breaker: CircuitBreakerConfig::from_env(),
            enable_detailed_logging,
        };

        // Fail at startup rather than on the first delivery
        config.endpoint()?;
        Ok(config)
    }

    /// Full URL of the sync endpoint
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.sync_path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| ConfigError::Invalid {
            name: "RELAY_COUNTERPART_URL",
            reason: format!("{joined}: {e}"),
        })
    }
}

impl CircuitBreakerConfig {
    /// Load circuit breaker configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let failure_threshold = env::var("RELAY_CB_FAILURE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.failure_threshold);

        let success_threshold = env::var("RELAY_CB_SUCCESS_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.success_threshold);

        let open_seconds = env::var("RELAY_CB_OPEN_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.open_seconds);

        Self {
            failure_threshold,
            success_threshold,
            open_seconds,
        }
    }
}
