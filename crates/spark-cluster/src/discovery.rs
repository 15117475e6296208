//! The discovery engine: welcome handshakes, identity/capability gossip, and
//! the reconnect/TTL-reaping timer.
//!
//! Grounded in `examples/original_source/components/discovery/discoverycomponent.cpp`
//! (`NewEndpointHandler`, `ProcessDiscoveryMessage`, `FinishDiscoverySetup`,
//! `DiscoveryTimerHandler`).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::codec::{EndpointId, MethodName, ParamMap, ParamValue, Request};
use crate::config::ClusterConfig;
use crate::endpoint::Endpoint;
use crate::manager::EndpointManager;
use crate::transport::Connector;

/// What this node currently believes about a component: when it last heard
/// from it, its reconnect address (if any), and its advertised capabilities.
#[derive(Clone, Debug)]
pub struct ComponentDiscoveryInfo {
    pub last_seen: Instant,
    pub node: Option<String>,
    pub service: Option<String>,
    pub publications: BTreeSet<MethodName>,
    pub subscriptions: BTreeSet<MethodName>,
}

impl ComponentDiscoveryInfo {
    fn new() -> Self {
        Self {
            last_seen: Instant::now(),
            node: None,
            service: None,
            publications: BTreeSet::new(),
            subscriptions: BTreeSet::new(),
        }
    }
}

/// Wire payload carried by `discovery::RegisterComponent` and
/// `discovery::NewComponent` messages.
#[derive(Clone, Debug, Default)]
pub struct DiscoveryMessage {
    pub identity: String,
    pub node: Option<String>,
    pub service: Option<String>,
    pub publications: Vec<String>,
    pub subscriptions: Vec<String>,
}

impl DiscoveryMessage {
    fn to_params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("identity".into(), ParamValue::from(self.identity.as_str()));
        if let Some(node) = &self.node {
            params.insert("node".into(), ParamValue::from(node.as_str()));
        }
        if let Some(service) = &self.service {
            params.insert("service".into(), ParamValue::from(service.as_str()));
        }
        params.insert(
            "publications".into(),
            ParamValue::List(self.publications.iter().map(|p| ParamValue::from(p.as_str())).collect()),
        );
        params.insert(
            "subscriptions".into(),
            ParamValue::List(self.subscriptions.iter().map(|p| ParamValue::from(p.as_str())).collect()),
        );
        params
    }

    fn from_params(params: &ParamMap) -> Option<Self> {
        let identity = params.get("identity")?.as_str()?.to_owned();
        let node = params.get("node").and_then(ParamValue::as_str).map(str::to_owned);
        let service = params.get("service").and_then(ParamValue::as_str).map(str::to_owned);
        let publications = params
            .get("publications")
            .and_then(ParamValue::as_list)
            .map(|items| items.iter().filter_map(ParamValue::as_str).map(str::to_owned).collect())
            .unwrap_or_default();
        let subscriptions = params
            .get("subscriptions")
            .and_then(ParamValue::as_list)
            .map(|items| items.iter().filter_map(ParamValue::as_str).map(str::to_owned).collect())
            .unwrap_or_default();
        Some(Self {
            identity,
            node,
            service,
            publications,
            subscriptions,
        })
    }
}

/// Matches `pattern` against `value`, where `*` in `pattern` matches any run of
/// characters. Used for role-based publish/subscribe permission checks, which
/// are configured as glob lists rather than exact method names.
fn glob_match(pattern: &str, value: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == value,
        Some((prefix, suffix)) => {
            value.len() >= prefix.len() + suffix.len()
                && value.starts_with(prefix)
                && value.ends_with(suffix)
        }
    }
}

/// Runs the welcome handshake, gossip of identity/capability information, and
/// the periodic reconnect/TTL-reap sweep.
pub struct DiscoveryEngine {
    manager: Arc<EndpointManager>,
    config: Arc<ClusterConfig>,
    connector: Option<Arc<dyn Connector>>,
    components: DashMap<EndpointId, ComponentDiscoveryInfo>,
}

impl DiscoveryEngine {
    pub fn new(
        manager: Arc<EndpointManager>,
        config: Arc<ClusterConfig>,
        connector: Option<Arc<dyn Connector>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            manager,
            config,
            connector,
            components: DashMap::new(),
        })
    }

    /// Wires the engine's handlers and `OnNewEndpoint` hook into the manager
    /// and spawns the reconnect/TTL timer. The timer fires immediately once,
    /// then every `discovery_interval`.
    pub fn start(self: &Arc<Self>) {
        let this = self.clone();
        self.manager
            .register_handler("discovery::RegisterComponent", move |source, request| {
                this.register_component_message_handler(source, request);
            });

        let this = self.clone();
        self.manager.register_handler("discovery::NewComponent", move |_source, request| {
            this.new_component_message_handler(request);
        });

        let this = self.clone();
        self.manager
            .register_handler("discovery::Welcome", move |source, _request| {
                this.welcome_message_handler(&source);
            });

        let this = self.clone();
        self.manager.on_new_endpoint(move |endpoint| {
            this.new_endpoint_handler(endpoint);
        });

        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.config.discovery_interval());
            loop {
                interval.tick().await;
                this.run_discovery_sweep().await;
            }
        });
    }

    /// Whether this node currently holds live discovery info for `identity`.
    pub fn knows_about(&self, identity: &str) -> bool {
        self.components.contains_key(identity)
    }

    fn self_identity(&self) -> EndpointId {
        Arc::from(self.manager.self_identity().as_ref())
    }

    fn new_endpoint_handler(self: &Arc<Self>, endpoint: &Arc<Endpoint>) {
        if endpoint.is_local() {
            return;
        }

        endpoint.register_publication("discovery::RegisterComponent");
        endpoint.register_publication("discovery::Welcome");

        let identity = endpoint.identity().clone();
        if identity.as_ref() == self.manager.self_identity().as_ref() {
            warn!(%identity, "detected loop-back connection, disconnecting");
            self.manager.unregister_endpoint(&identity);
            let _ = endpoint.transition(crate::endpoint::ConnectionState::Disconnected);
            return;
        }

        endpoint.register_subscription("discovery::RegisterComponent");
        self.send_discovery_message(
            "discovery::RegisterComponent",
            &self.self_identity(),
            Some(identity.as_ref()),
        );

        endpoint.register_subscription("discovery::NewComponent");
        self.send_discovery_message("discovery::NewComponent", &self.self_identity(), Some(identity.as_ref()));

        for entry in self.components.iter() {
            self.send_discovery_message("discovery::NewComponent", entry.key(), Some(identity.as_ref()));
        }

        match self.components.get(identity.as_ref()) {
            None => {
                // Wait for a broker's discovery::NewComponent message before
                // granting this endpoint any capabilities.
            }
            Some(info) => {
                for publication in &info.publications {
                    endpoint.register_publication(publication.clone());
                }
                for subscription in &info.subscriptions {
                    endpoint.register_subscription(subscription.clone());
                }
                drop(info);
                self.finish_discovery_setup(endpoint);
            }
        }
    }

    fn welcome_message_handler(&self, source: &EndpointId) {
        let Some(endpoint) = self.manager.endpoint_by_identity(source) else {
            return;
        };
        if endpoint.welcome_received() {
            return;
        }
        endpoint.mark_welcome_received();
    }

    fn finish_discovery_setup(&self, endpoint: &Arc<Endpoint>) {
        if endpoint.welcome_sent() {
            return;
        }
        endpoint.register_subscription("discovery::Welcome");
        if let Err(error) = self
            .manager
            .send_unicast(endpoint.identity(), Request::new("discovery::Welcome", ParamMap::new()))
        {
            warn!(%error, identity = %endpoint.identity(), "failed to send welcome message");
            return;
        }
        endpoint.mark_welcome_sent();
    }

    fn send_discovery_message(&self, method: &str, identity: &str, recipient: Option<&str>) {
        let Some(info) = self.component_discovery_info(identity) else {
            return;
        };

        let message = DiscoveryMessage {
            identity: identity.to_string(),
            node: info.node.clone(),
            service: info.service.clone(),
            publications: info.publications.iter().map(|s| s.to_string()).collect(),
            subscriptions: info.subscriptions.iter().map(|s| s.to_string()).collect(),
        };
        let request = Request::new(MethodName::from(method), message.to_params());

        match recipient {
            Some(recipient) => {
                if let Err(error) = self.manager.send_unicast(recipient, request) {
                    debug!(%error, "discovery message unicast failed");
                }
            }
            None => self.manager.send_multicast(&self.self_identity(), request),
        }
    }

    fn component_discovery_info(&self, identity: &str) -> Option<ComponentDiscoveryInfo> {
        if identity == self.manager.self_identity().as_ref() {
            let mut info = ComponentDiscoveryInfo::new();
            for endpoint in self.manager.connected_endpoints() {
                info.publications.extend(endpoint.publications());
                info.subscriptions.extend(endpoint.subscriptions());
            }
            return Some(info);
        }
        self.components.get(identity).map(|entry| entry.clone())
    }

    fn has_message_permission(&self, identity: &str, message_type: &str, message: &str) -> bool {
        let Some(endpoint_config) = self.config.endpoints.iter().find(|e| e.name == identity) else {
            return false;
        };
        for role_name in &endpoint_config.roles {
            let Some(role) = self.config.roles.get(role_name) else {
                continue;
            };
            let patterns = match message_type {
                "publications" => &role.publications,
                "subscriptions" => &role.subscriptions,
                _ => continue,
            };
            if patterns.iter().any(|pattern| glob_match(pattern, message)) {
                return true;
            }
        }
        false
    }

    /// Registers or refreshes a component's capability info, applying either
    /// `trusted` (broker-relayed, unconditional) or role-gated permission
    /// checks, then re-gossips and, for untrusted registrations, finishes the
    /// handshake.
    fn process_discovery_message(self: &Arc<Self>, identity: EndpointId, message: DiscoveryMessage, trusted: bool) {
        if identity.as_ref() == self.manager.self_identity().as_ref() {
            return;
        }

        let mut info = ComponentDiscoveryInfo::new();
        if let Some(node) = message.node.filter(|n| !n.is_empty()) {
            info.node = Some(node);
        }
        if let Some(service) = message.service.filter(|s| !s.is_empty()) {
            info.service = Some(service);
        }

        let endpoint = self.manager.endpoint_by_identity(&identity);

        for publication in message.publications {
            if trusted || self.has_message_permission(&identity, "publications", &publication) {
                info.publications.insert(MethodName::from(publication.as_str()));
                if let Some(endpoint) = &endpoint {
                    endpoint.register_publication(publication);
                }
            }
        }
        for subscription in message.subscriptions {
            if trusted || self.has_message_permission(&identity, "subscriptions", &subscription) {
                info.subscriptions.insert(MethodName::from(subscription.as_str()));
                if let Some(endpoint) = &endpoint {
                    endpoint.register_subscription(subscription);
                }
            }
        }

        self.components.insert(identity.clone(), info);
        self.send_discovery_message("discovery::NewComponent", &identity, None);

        if let Some(endpoint) = &endpoint {
            if !trusted {
                self.finish_discovery_setup(endpoint);
            }
        }
    }

    fn new_component_message_handler(self: &Arc<Self>, request: Request) {
        let Some(message) = DiscoveryMessage::from_params(&request.params) else {
            return;
        };
        let identity = EndpointId::from(message.identity.as_str());
        self.process_discovery_message(identity, message, true);
    }

    fn register_component_message_handler(self: &Arc<Self>, source: EndpointId, request: Request) {
        let Some(message) = DiscoveryMessage::from_params(&request.params) else {
            return;
        };
        self.process_discovery_message(source, message, false);
    }

    /// Runs one reconnect/TTL-reap sweep immediately, outside of the timer
    /// loop. `start()` calls this on every tick; exposed directly so a host
    /// (or a test driving small TTLs) can force a sweep without waiting.
    pub async fn run_discovery_sweep(self: &Arc<Self>) {
        for configured in &self.config.endpoints {
            if self.manager.endpoint_by_identity(&configured.name).is_some() {
                continue;
            }
            if let (Some(node), Some(service)) = (&configured.node, &configured.service) {
                self.dial(node, service).await;
            }
        }

        let now = Instant::now();
        let registration_ttl = self.config.registration_ttl();
        let stale: Vec<EndpointId> = self
            .components
            .iter()
            .filter_map(|entry| {
                let identity = entry.key().clone();
                if identity.as_ref() == self.manager.self_identity().as_ref() {
                    return None;
                }
                if self.config.endpoints.iter().any(|e| e.name.as_str() == identity.as_ref()) {
                    return None;
                }
                if now.duration_since(entry.last_seen) > registration_ttl {
                    Some(identity)
                } else {
                    None
                }
            })
            .collect();
        for identity in stale {
            info!(%identity, "discovery registration expired, reaping");
            self.components.remove(identity.as_ref());
        }

        let live: Vec<(EndpointId, Option<(String, String)>)> = self
            .components
            .iter()
            .filter_map(|entry| {
                let identity = entry.key().clone();
                if identity.as_ref() == self.manager.self_identity().as_ref() {
                    return None;
                }
                if self.config.endpoints.iter().any(|e| e.name.as_str() == identity.as_ref()) {
                    return None;
                }
                let reconnect = entry.node.clone().zip(entry.service.clone());
                Some((identity, reconnect))
            })
            .collect();

        for (identity, reconnect) in live {
            self.send_discovery_message("discovery::NewComponent", &identity, None);
            match self.manager.endpoint_by_identity(&identity) {
                Some(endpoint) if endpoint.is_connected() => {
                    if let Some(mut entry) = self.components.get_mut(identity.as_ref()) {
                        entry.last_seen = Instant::now();
                    }
                }
                _ => {
                    if let Some((node, service)) = reconnect {
                        self.dial(&node, &service).await;
                    }
                }
            }
        }
    }

    async fn dial(self: &Arc<Self>, node: &str, service: &str) {
        let Some(connector) = &self.connector else {
            return;
        };
        match connector.connect(node, service).await {
            Ok(channel) => {
                self.manager.add_connection(channel);
            }
            Err(error) => {
                debug!(%error, %node, %service, "reconnect attempt failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(identity: &str) -> Arc<ClusterConfig> {
        Arc::new(ClusterConfig {
            identity: identity.to_string(),
            endpoints: Vec::new(),
            roles: Default::default(),
            registration_ttl_secs: 300,
            discovery_interval_secs: 30,
            delegation_interval_secs: 30,
            api_timeout_secs: 1,
        })
    }

    #[test]
    fn glob_match_supports_a_single_wildcard() {
        assert!(glob_match("checker::*", "checker::CheckResult"));
        assert!(glob_match("discovery::RegisterComponent", "discovery::RegisterComponent"));
        assert!(!glob_match("checker::*", "discovery::Welcome"));
    }

    #[tokio::test]
    async fn welcome_handshake_establishes_session_both_directions() {
        let manager_a = EndpointManager::new("a", Duration::from_secs(1));
        let discovery_a = DiscoveryEngine::new(manager_a.clone(), config("a"), None);
        discovery_a.start();

        let manager_b = EndpointManager::new("b", Duration::from_secs(1));
        let discovery_b = DiscoveryEngine::new(manager_b.clone(), config("b"), None);
        discovery_b.start();

        let (channel_a, channel_b) = crate::transport::in_memory::InMemoryChannel::pair(
            EndpointId::from("a"),
            EndpointId::from("b"),
        );
        let endpoint_on_a = manager_a.add_connection(Box::new(channel_a));
        let endpoint_on_b = manager_b.add_connection(Box::new(channel_b));
        endpoint_on_a.transition(crate::endpoint::ConnectionState::Handshaking).unwrap();
        endpoint_on_a.transition(crate::endpoint::ConnectionState::Established).unwrap();
        endpoint_on_b.transition(crate::endpoint::ConnectionState::Handshaking).unwrap();
        endpoint_on_b.transition(crate::endpoint::ConnectionState::Established).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(endpoint_on_a.welcome_sent());
        assert!(endpoint_on_b.welcome_sent());
    }
}
