//! Cluster configuration knobs (spec §6): identity, static peer list, role-based
//! publication/subscription policy, and the discovery/delegation timers.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ClusterError;

fn default_registration_ttl() -> u64 {
    300
}

fn default_discovery_interval() -> u64 {
    30
}

fn default_delegation_interval() -> u64 {
    30
}

fn default_api_timeout() -> u64 {
    30
}

/// One statically-configured peer. Endpoints discovered purely through gossip
/// do not appear here — only peers the operator named explicitly, which are
/// the ones the discovery engine's TTL reaper is forbidden to drop.
#[derive(Clone, Debug, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub node: Option<String>,
    pub service: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Publication/subscription glob lists granted to a role.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RoleConfig {
    #[serde(default)]
    pub publications: Vec<String>,
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClusterConfig {
    pub identity: String,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,
    #[serde(default = "default_registration_ttl")]
    pub registration_ttl_secs: u64,
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,
    #[serde(default = "default_delegation_interval")]
    pub delegation_interval_secs: u64,
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
}

impl ClusterConfig {
    /// The only startup-fatal condition named by spec §7: a missing identity.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.identity.trim().is_empty() {
            return Err(ClusterError::MissingConfig {
                key: "identity".into(),
            });
        }
        Ok(())
    }

    pub fn registration_ttl(&self) -> Duration {
        Duration::from_secs(self.registration_ttl_secs)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    pub fn delegation_interval(&self) -> Duration {
        Duration::from_secs(self.delegation_interval_secs)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identity_is_the_only_fatal_condition() {
        let config = ClusterConfig {
            identity: String::new(),
            endpoints: Vec::new(),
            roles: BTreeMap::new(),
            registration_ttl_secs: default_registration_ttl(),
            discovery_interval_secs: default_discovery_interval(),
            delegation_interval_secs: default_delegation_interval(),
            api_timeout_secs: default_api_timeout(),
        };
        assert!(matches!(
            config.validate(),
            Err(ClusterError::MissingConfig { .. })
        ));
    }

    #[test]
    fn defaults_match_spec_knobs() {
        let toml = r#"identity = "a""#;
        let config: ClusterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.registration_ttl_secs, 300);
        assert_eq!(config.discovery_interval_secs, 30);
        assert_eq!(config.delegation_interval_secs, 30);
    }
}
