//! A peer replaying a since-deleted, self-originated object must not resurrect
//! it locally; instead the node replies with `config::ObjectRemoved` so the
//! peer forgets its stale copy too.

use std::sync::Arc;
use std::time::Duration;

use spark_cluster::codec::{ParamMap, ParamValue, Request};
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

fn replayed_update(object_type: &str, name: &str, source: &str) -> Request {
    let mut params = ParamMap::new();
    params.insert("name".into(), ParamValue::from(name));
    params.insert("type".into(), ParamValue::from(object_type));
    params.insert("source".into(), ParamValue::from(source));
    params.insert("update".into(), ParamValue::Map(ParamMap::new()));
    Request::new("config::ObjectUpdate", params)
}

#[tokio::test]
async fn replaying_a_deleted_self_originated_object_triggers_removal_reply() {
    let manager_a = EndpointManager::new("node-a", Duration::from_secs(1));
    let store_a = Arc::new(ObjectStore::new());
    let replication_a = ReplicationEngine::new(manager_a.clone(), store_a.clone());
    replication_a.start();
    let discovery_a = DiscoveryEngine::new(manager_a.clone(), config("node-a"), None);
    discovery_a.start();

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
    tokio::time::sleep(Duration::from_millis(50)).await;

    // node-a authors and later deletes a service locally.
    replication_a.register_local_object(DynamicObject::new_local("service", "s1"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store_b.contains("service", "s1"));

    replication_a.unregister_local_object("service", "s1");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!store_a.contains("service", "s1"));
    assert!(!store_b.contains("service", "s1"));

    // node-b (or a relay) later replays a stale copy node-a originally authored.
    manager_a.route_inbound(EndpointId::from("node-b"), replayed_update("service", "s1", "node-a"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!store_a.contains("service", "s1"), "must not resurrect a deleted self-originated object");
    assert!(!store_b.contains("service", "s1"), "peer must also drop its stale copy after the reply");
}
