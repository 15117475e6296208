//! Services with no checker get delegated to a connected, subscribed
//! candidate, and assignments stay histogram-balanced across candidates.

use std::sync::Arc;
use std::time::Duration;

use spark_cluster::endpoint::{ConnectionState, Endpoint};
use spark_cluster::object_store::DynamicObject;
use spark_cluster::{DelegationEngine, EndpointId, EndpointManager, ObjectStore};

fn connected_subscriber(manager: &Arc<EndpointManager>, identity: &str) {
    let endpoint = Arc::new(Endpoint::new(EndpointId::from(identity), false));
    endpoint.transition(ConnectionState::Connecting).unwrap();
    endpoint.transition(ConnectionState::Handshaking).unwrap();
    endpoint.transition(ConnectionState::Established).unwrap();
    endpoint.register_subscription("checker::AssignService");
    manager.register_endpoint(endpoint);
}

#[tokio::test]
async fn services_converge_to_a_balanced_assignment() {
    let manager = EndpointManager::new("self", Duration::from_millis(200));
    let store = Arc::new(ObjectStore::new());
    for i in 0..6 {
        store.register(DynamicObject::new_local("service", format!("svc-{i}")));
    }

    connected_subscriber(&manager, "checker-a");
    connected_subscriber(&manager, "checker-b");

    let delegation = DelegationEngine::new(manager.clone(), store.clone(), Duration::from_secs(30));
    delegation.start();

    // Give the spawned AssignService calls a couple of rounds to land.
    for _ in 0..5 {
        delegation.run_delegation_sweep().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut assigned_to_a = 0;
    let mut assigned_to_b = 0;
    for i in 0..6 {
        match delegation.checker_of(&format!("svc-{i}")).as_deref() {
            Some("checker-a") => assigned_to_a += 1,
            Some("checker-b") => assigned_to_b += 1,
            _ => {}
        }
    }

    assert_eq!(assigned_to_a + assigned_to_b, 6, "every service should have a checker");
    assert!((assigned_to_a as i32 - assigned_to_b as i32).abs() <= 4, "assignment should be roughly balanced");
}
