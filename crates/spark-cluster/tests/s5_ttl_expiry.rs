//! A gossiped component we stop hearing from is reaped once its registration
//! TTL elapses, but a statically-configured peer is exempt from reaping.

use std::sync::Arc;
use std::time::Duration;

use spark_cluster::{ClusterConfig, DiscoveryEngine, EndpointConfig, EndpointId, EndpointManager, ParamMap, ParamValue, Request};

fn register_component_message(identity: &str) -> Request {
    let mut params = ParamMap::new();
    params.insert("identity".into(), ParamValue::from(identity));
    Request::new("discovery::RegisterComponent", params)
}

fn config_with(endpoints: Vec<EndpointConfig>) -> Arc<ClusterConfig> {
    Arc::new(ClusterConfig {
        identity: "node-a".to_string(),
        endpoints,
        roles: Default::default(),
        registration_ttl_secs: 0,
        discovery_interval_secs: 30,
        delegation_interval_secs: 30,
        api_timeout_secs: 1,
    })
}

#[tokio::test]
async fn gossiped_component_is_reaped_after_its_ttl_elapses() {
    let manager = EndpointManager::new("node-a", Duration::from_secs(1));
    let config = config_with(Vec::new());
    let discovery = DiscoveryEngine::new(manager.clone(), config, None);
    discovery.start();

    manager.route_inbound(EndpointId::from("node-b"), register_component_message("node-b"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(discovery.knows_about("node-b"));

    // registration_ttl_secs is 0, so the very next sweep should reap it.
    tokio::time::sleep(Duration::from_millis(10)).await;
    discovery.run_discovery_sweep().await;

    assert!(!discovery.knows_about("node-b"), "stale gossiped component should be reaped");
}

#[tokio::test]
async fn statically_configured_peer_is_never_reaped() {
    let manager = EndpointManager::new("node-a", Duration::from_secs(1));
    let config = config_with(vec![EndpointConfig {
        name: "node-b".to_string(),
        node: None,
        service: None,
        roles: Vec::new(),
    }]);
    let discovery = DiscoveryEngine::new(manager.clone(), config, None);
    discovery.start();

    manager.route_inbound(EndpointId::from("node-b"), register_component_message("node-b"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(discovery.knows_about("node-b"));

    discovery.run_discovery_sweep().await;
    discovery.run_discovery_sweep().await;

    assert!(
        discovery.knows_about("node-b"),
        "a statically-configured endpoint must never be TTL-reaped"
    );
}
