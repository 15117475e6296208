//! Two nodes connect over an in-memory channel and complete the welcome
//! handshake in both directions.

use std::sync::Arc;
use std::time::Duration;

use spark_cluster::discovery::DiscoveryEngine;
use spark_cluster::endpoint::ConnectionState;
use spark_cluster::transport::in_memory::InMemoryChannel;
use spark_cluster::{ClusterConfig, EndpointId, EndpointManager};

fn config(identity: &str) -> Arc<ClusterConfig> {
    Arc::new(ClusterConfig {
        identity: identity.to_string(),
        endpoints: Vec::new(),
        roles: Default::default(),
        registration_ttl_secs: 300,
        discovery_interval_secs: 3600,
        delegation_interval_secs: 3600,
        api_timeout_secs: 1,
    })
}

#[tokio::test]
async fn welcome_handshake_completes_both_directions() {
    let manager_a = EndpointManager::new("node-a", Duration::from_secs(1));
    let discovery_a = DiscoveryEngine::new(manager_a.clone(), config("node-a"), None);
    discovery_a.start();

    let manager_b = EndpointManager::new("node-b", Duration::from_secs(1));
    let discovery_b = DiscoveryEngine::new(manager_b.clone(), config("node-b"), None);
    discovery_b.start();

    let (channel_a, channel_b) = InMemoryChannel::pair(EndpointId::from("node-a"), EndpointId::from("node-b"));
    let endpoint_on_a = manager_a.add_connection(Box::new(channel_a));
    let endpoint_on_b = manager_b.add_connection(Box::new(channel_b));

    for endpoint in [&endpoint_on_a, &endpoint_on_b] {
        // add_connection already moved the endpoint to Connecting.
        endpoint.transition(ConnectionState::Handshaking).unwrap();
        endpoint.transition(ConnectionState::Established).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(endpoint_on_a.welcome_sent());
    assert!(endpoint_on_a.welcome_received());
    assert!(endpoint_on_b.welcome_sent());
    assert!(endpoint_on_b.welcome_received());
}
