//! Two connections claiming the same peer identity must not coexist: the
//! newer registration wins and the older endpoint is disconnected.

use std::time::Duration;

use spark_cluster::endpoint::ConnectionState;
use spark_cluster::transport::in_memory::InMemoryChannel;
use spark_cluster::{EndpointId, EndpointManager};

#[tokio::test]
async fn newer_connection_for_the_same_identity_displaces_the_older_one() {
    let manager = EndpointManager::new("self", Duration::from_secs(1));

    let (first_channel, _first_peer_channel) =
        InMemoryChannel::pair(EndpointId::from("self"), EndpointId::from("node-b"));
    let first_endpoint = manager.add_connection(Box::new(first_channel));
    first_endpoint.transition(ConnectionState::Handshaking).unwrap();
    first_endpoint.transition(ConnectionState::Established).unwrap();
    assert_eq!(first_endpoint.state(), ConnectionState::Established);

    let (second_channel, _second_peer_channel) =
        InMemoryChannel::pair(EndpointId::from("self"), EndpointId::from("node-b"));
    let second_endpoint = manager.add_connection(Box::new(second_channel));

    assert_eq!(
        first_endpoint.state(),
        ConnectionState::Disconnected,
        "the superseded connection must be torn down"
    );
    assert!(!std::sync::Arc::ptr_eq(&first_endpoint, &second_endpoint));

    let current = manager.endpoint_by_identity("node-b").expect("node-b still registered");
    assert!(std::sync::Arc::ptr_eq(&current, &second_endpoint), "manager must keep only the newer endpoint");
}
