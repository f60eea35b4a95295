//! Process-level server configuration: which side of the protocol this
//! process plays and where it listens.

use super::ConfigError;
use std::{env, fmt, path::Path, str::FromStr};

/// Which half of the sync protocol the process serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Reward-issuing identity service: verifies proofs and signs outbound syncs
    Issuer,
    /// Commerce platform: verifies and applies inbound syncs
    Commerce,
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "issuer" => Ok(Role::Issuer),
            "commerce" => Ok(Role::Commerce),
            other => Err(ConfigError::Invalid {
                name: "RELAY_ROLE",
                reason: format!("expected `issuer` or `commerce`, got `{other}`"),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Issuer => f.write_str("issuer"),
            Role::Commerce => f.write_str("commerce"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub role: Role,
    pub bind_address: String,
    /// Route the commerce side mounts the sync mutation on
    pub sync_route: String,
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            role: Role::Commerce,
            bind_address: "127.0.0.1:8080".to_string(),
            sync_route: "/api/v1/nebula/sync-rewards".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let role = match env::var("RELAY_ROLE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.role,
        };

        let bind_address = detect_bind_address(
            env::var("KUBERNETES_SERVICE_HOST").ok().as_deref(),
            env::var("DOCKER_CONTAINER").ok().as_deref(),
            Path::new("/.dockerenv").exists(),
            env::var("BIND_ADDRESS").ok().as_deref(),
        );

        let sync_route = env::var("RELAY_SYNC_ROUTE").unwrap_or(defaults.sync_route);

        let metrics_enabled = env::var("METRICS_ENABLED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.metrics_enabled);

        Ok(Self {
            role,
            bind_address,
            sync_route,
            metrics_enabled,
        })
    }
}

/// Pick the listen address: explicit override first, all interfaces inside
/// a container, loopback otherwise.
pub fn detect_bind_address(
    k8s_service_host: Option<&str>,
    docker_container: Option<&str>,
    dockerenv_exists: bool,
    bind_override: Option<&str>,
) -> String {
    if let Some(bind) = bind_override.filter(|b| !b.is_empty()) {
        return bind.to_string();
    }

    if k8s_service_host.is_some() || docker_container.is_some() || dockerenv_exists {
        "0.0.0.0:8080".to_string()
    } else {
        "127.0.0.1:8080".to_string()
    }
}
