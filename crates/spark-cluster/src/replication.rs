//! Configuration replication: multicasting local object mutations, initial
//! sync for newly-established sessions, and the inbound update/removal
//! handlers (including the ghost-object echo-suppression case).
//!
//! Grounded in `examples/original_source/components/replication/replicationcomponent.cpp`
//! (`MakeObjectMessage`, `EndpointConnectedHandler`, `RemoteObjectUpdateHandler`,
//! `RemoteObjectRemovedHandler`) and [`crate::object_store`] for the store itself.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::codec::{EndpointId, ParamMap, ParamValue, Request};
use crate::endpoint::Endpoint;
use crate::manager::EndpointManager;
use crate::object_store::{AttributeMask, DynamicObject, ObjectStore, RegisterOutcome};

const METHOD_OBJECT_UPDATE: &str = "config::ObjectUpdate";
const METHOD_OBJECT_REMOVED: &str = "config::ObjectRemoved";

/// Drives config replication for one node: owns no state of its own beyond a
/// reference to the shared [`ObjectStore`] and [`EndpointManager`].
pub struct ReplicationEngine {
    manager: Arc<EndpointManager>,
    store: Arc<ObjectStore>,
}

impl ReplicationEngine {
    pub fn new(manager: Arc<EndpointManager>, store: Arc<ObjectStore>) -> Arc<Self> {
        Arc::new(Self { manager, store })
    }

    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    pub fn start(self: &Arc<Self>) {
        let this = self.clone();
        self.manager.register_handler(METHOD_OBJECT_UPDATE, move |source, request| {
            this.remote_object_update_handler(source, request);
        });

        let this = self.clone();
        self.manager.register_handler(METHOD_OBJECT_REMOVED, move |source, request| {
            this.remote_object_removed_handler(source, request);
        });

        let this = self.clone();
        self.manager.on_new_endpoint(move |endpoint| {
            this.hook_new_endpoint(endpoint);
        });
    }

    fn hook_new_endpoint(self: &Arc<Self>, endpoint: &Arc<Endpoint>) {
        if endpoint.is_local() {
            return;
        }
        let this = self.clone();
        endpoint.on_session_established(Box::new(move |established| {
            this.endpoint_connected_handler(established);
        }));
    }

    /// Subscribes the newly-established peer to object updates/removals and
    /// pushes it a full snapshot of everything this node currently knows.
    fn endpoint_connected_handler(&self, endpoint: &Endpoint) {
        endpoint.register_subscription(METHOD_OBJECT_UPDATE);
        endpoint.register_subscription(METHOD_OBJECT_REMOVED);

        for object in self.store.all_objects() {
            let request = self.make_object_update(&object);
            if let Err(error) = self.manager.send_unicast(endpoint.identity(), request) {
                warn!(%error, identity = %endpoint.identity(), "initial sync unicast failed");
            }
        }
    }

    fn make_object_update(&self, object: &DynamicObject) -> Request {
        let mut params = ParamMap::new();
        params.insert("name".into(), ParamValue::from(object.name.as_str()));
        params.insert("type".into(), ParamValue::from(object.object_type.as_str()));
        let source = object
            .source
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.manager.self_identity().to_string());
        params.insert("source".into(), ParamValue::from(source.as_str()));
        params.insert(
            "update".into(),
            ParamValue::Map(object.build_update(object.transaction, AttributeMask::all_replicated())),
        );
        Request::new(METHOD_OBJECT_UPDATE, params)
    }

    fn make_object_removed(&self, object_type: &str, name: &str) -> Request {
        let mut params = ParamMap::new();
        params.insert("name".into(), ParamValue::from(name));
        params.insert("type".into(), ParamValue::from(object_type));
        Request::new(METHOD_OBJECT_REMOVED, params)
    }

    /// Registers a locally-authored object and, if it is new, multicasts it to
    /// every peer subscribed to object updates.
    pub fn register_local_object(&self, object: DynamicObject) -> RegisterOutcome {
        let outcome = self.store.register(object.clone());
        if outcome == RegisterOutcome::Created {
            let request = self.make_object_update(&object);
            self.manager.send_multicast(self.manager.self_identity(), request);
        }
        outcome
    }

    pub fn unregister_local_object(&self, object_type: &str, name: &str) {
        if self.store.unregister(object_type, name).is_some() {
            let request = self.make_object_removed(object_type, name);
            self.manager.send_multicast(self.manager.self_identity(), request);
        }
    }

    /// Applies a locally-originated attribute mutation and multicasts the
    /// resulting diff, the analogue of a closing-transaction flush.
    pub fn flush_local_update(&self, object_type: &str, name: &str) {
        let Some(object) = self.store.get(object_type, name) else {
            return;
        };
        let request = self.make_object_update(&object);
        self.manager.send_multicast(self.manager.self_identity(), request);
    }

    fn remote_object_update_handler(&self, source: EndpointId, request: Request) {
        let Some(name) = request.get("name").and_then(ParamValue::as_str) else {
            return;
        };
        let Some(object_type) = request.get("type").and_then(ParamValue::as_str) else {
            return;
        };
        // An empty (or missing) `source` attributes the update to whichever
        // endpoint actually relayed it to us.
        let origin_identity = request
            .get("source")
            .and_then(ParamValue::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(source.as_ref())
            .to_string();
        let Some(update) = request.get("update").and_then(ParamValue::as_map) else {
            return;
        };
        if !self.store.contains(object_type, name) {
            let mut ghost = DynamicObject::new_remote(
                object_type,
                name,
                EndpointId::from(origin_identity.as_str()),
            );
            let transaction = self.store.next_transaction();
            ghost.apply_update(update, transaction);

            if origin_identity == self.manager.self_identity().as_ref() {
                debug!(
                    %object_type,
                    %name,
                    "peer replayed an object we originated and have since deleted, replying ObjectRemoved"
                );
                let request = self.make_object_removed(object_type, name);
                self.manager.send_multicast(self.manager.self_identity(), request);
                return;
            }

            debug!(%object_type, %name, source = %origin_identity, "received new object from replication source");
            self.store.register(ghost);
            return;
        }

        let object_is_local = self.store.get(object_type, name).map(|o| o.is_local).unwrap_or(false);
        if object_is_local {
            error!(
                %object_type,
                %name,
                "refusing to apply a replicated update onto a locally-authoritative object"
            );
            return;
        }

        let transaction = self.store.next_transaction();
        self.store.with_mut(object_type, name, |object| {
            object.apply_update(update, transaction);
        });
    }

    fn remote_object_removed_handler(&self, _source: EndpointId, request: Request) {
        let Some(name) = request.get("name").and_then(ParamValue::as_str) else {
            return;
        };
        let Some(object_type) = request.get("type").and_then(ParamValue::as_str) else {
            return;
        };

        let Some(object) = self.store.get(object_type, name) else {
            return;
        };
        if object.is_local {
            return;
        }
        self.store.unregister(object_type, name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn engine(identity: &str) -> Arc<ReplicationEngine> {
        let manager = EndpointManager::new(identity, Duration::from_secs(1));
        ReplicationEngine::new(manager, Arc::new(ObjectStore::new()))
    }

    #[test]
    fn registering_a_new_object_multicasts_an_update() {
        let engine = engine("a");
        let received = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let received2 = received.clone();
        engine.manager.register_handler(METHOD_OBJECT_UPDATE, move |_s, _r| {
            received2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        let peer = Arc::new(Endpoint::new(EndpointId::from("peer"), true));
        peer.register_subscription(METHOD_OBJECT_UPDATE);
        engine.manager.register_endpoint(peer);

        let outcome = engine.register_local_object(DynamicObject::new_local("host", "h1"));
        assert_eq!(outcome, RegisterOutcome::Created);
        assert_eq!(received.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn remote_update_for_unknown_object_registers_a_ghost() {
        let engine = engine("a");
        let request = engine.make_object_update(&DynamicObject::new_local("service", "s1"));
        engine.remote_object_update_handler(EndpointId::from("b"), request);
        assert!(engine.store.contains("service", "s1"));
        assert!(!engine.store.get("service", "s1").unwrap().is_local);
    }

    #[test]
    fn remote_update_replaying_our_own_deleted_object_triggers_removal_reply() {
        let engine = engine("a");
        let mut params = ParamMap::new();
        params.insert("name".into(), ParamValue::from("s1"));
        params.insert("type".into(), ParamValue::from("service"));
        params.insert("source".into(), ParamValue::from("a"));
        params.insert("update".into(), ParamValue::Map(ParamMap::new()));
        let request = Request::new(METHOD_OBJECT_UPDATE, params);

        let removed_reply = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let removed_reply2 = removed_reply.clone();
        engine.manager.register_handler(METHOD_OBJECT_REMOVED, move |_s, _r| {
            removed_reply2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        let peer = Arc::new(Endpoint::new(EndpointId::from("self-listener"), true));
        peer.register_subscription(METHOD_OBJECT_REMOVED);
        engine.manager.register_endpoint(peer);

        engine.remote_object_update_handler(EndpointId::from("b"), request);
        assert!(!engine.store.contains("service", "s1"));
        assert_eq!(removed_reply.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn remote_removal_of_local_object_is_ignored() {
        let engine = engine("a");
        engine.store.register(DynamicObject::new_local("host", "h1"));
        let request = engine.make_object_removed("host", "h1");
        engine.remote_object_removed_handler(EndpointId::from("b"), request);
        assert!(engine.store.contains("host", "h1"));
    }
}
