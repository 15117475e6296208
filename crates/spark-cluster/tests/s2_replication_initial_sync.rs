//! A node that already owns config objects pushes a full snapshot to a peer
//! the moment that peer's session reaches `Established`.

use std::sync::Arc;
use std::time::Duration;

use spark_cluster::discovery::DiscoveryEngine;
use spark_cluster::endpoint::ConnectionState;
use spark_cluster::object_store::DynamicObject;
use spark_cluster::transport::in_memory::InMemoryChannel;
use spark_cluster::{ClusterConfig, EndpointId, EndpointManager, ObjectStore, ReplicationEngine};

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
async fn new_session_receives_a_full_snapshot() {
    let manager_a = EndpointManager::new("node-a", Duration::from_secs(1));
    let store_a = Arc::new(ObjectStore::new());
    let replication_a = ReplicationEngine::new(manager_a.clone(), store_a.clone());
    replication_a.start();
    let discovery_a = DiscoveryEngine::new(manager_a.clone(), config("node-a"), None);
    discovery_a.start();
    store_a.register(DynamicObject::new_local("host", "h1"));
    store_a.register(DynamicObject::new_local("service", "h1-ping"));

    let manager_b = EndpointManager::new("node-b", Duration::from_secs(1));
    let store_b = Arc::new(ObjectStore::new());
    let replication_b = ReplicationEngine::new(manager_b.clone(), store_b.clone());
    replication_b.start();
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

    assert!(store_b.contains("host", "h1"));
    assert!(store_b.contains("service", "h1-ping"));
    assert!(!store_b.get("host", "h1").unwrap().is_local);
}
