//! The endpoint manager: the shared endpoint table, unicast/multicast routing,
//! and the correlated request/response path (`SendAPIMessage`).
//!
//! Grounded in `spark-switch::core::session_manager::SessionManager` for the
//! concurrent-map-backed registry shape, and in
//! `examples/original_source/libicinga/endpointmanager.h` for the
//! routing/dispatch responsibilities themselves.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::codec::{EndpointId, MethodName, Request};
use crate::endpoint::{ConnectionState, Endpoint};
use crate::error::ClusterError;
use crate::transport::Channel;

type Handler = Arc<dyn Fn(EndpointId, Request) + Send + Sync>;
type NewEndpointHook = Box<dyn Fn(&Arc<Endpoint>) + Send + Sync>;

/// Owns every [`Endpoint`] this node knows about, plus the string-keyed handler
/// dispatch table that both local delivery and inbound-message processing run
/// through.
///
/// String-keyed dispatch (rather than a closed sum type of messages) is kept
/// deliberately: the method namespace (`discovery::*`, `config::*`,
/// `checker::*`) is open-ended, and new engines should be able to register
/// handlers without this type knowing about them.
pub struct EndpointManager {
    self_identity: EndpointId,
    endpoints: DashMap<EndpointId, Arc<Endpoint>>,
    handlers: DashMap<MethodName, Vec<Handler>>,
    pending_calls: DashMap<Arc<str>, oneshot::Sender<(Option<Request>, bool)>>,
    new_endpoint_hooks: std::sync::Mutex<Vec<NewEndpointHook>>,
    next_call_id: AtomicU64,
    api_timeout: Duration,
}

impl EndpointManager {
    pub fn new(self_identity: impl Into<EndpointId>, api_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            self_identity: self_identity.into(),
            endpoints: DashMap::new(),
            handlers: DashMap::new(),
            pending_calls: DashMap::new(),
            new_endpoint_hooks: std::sync::Mutex::new(Vec::new()),
            next_call_id: AtomicU64::new(1),
            api_timeout,
        })
    }

    pub fn self_identity(&self) -> &EndpointId {
        &self.self_identity
    }

    /// Registers a handler invoked whenever `method` is delivered to this node,
    /// whether via a local dispatch (the sender is a local endpoint) or because
    /// a remote peer unicast/multicast it to us.
    pub fn register_handler(
        &self,
        method: impl Into<MethodName>,
        handler: impl Fn(EndpointId, Request) + Send + Sync + 'static,
    ) {
        self.handlers
            .entry(method.into())
            .or_default()
            .push(Arc::new(handler));
    }

    pub fn on_new_endpoint(&self, hook: impl Fn(&Arc<Endpoint>) + Send + Sync + 'static) {
        self.new_endpoint_hooks.lock().unwrap().push(Box::new(hook));
    }

    /// Registers an endpoint (local or remote) and fires `OnNewEndpoint` hooks.
    /// An identity collision — registering an identity that already has an
    /// endpoint — disconnects and drops the older registration (spec §7/§8 S6);
    /// the caller is responsible for actually tearing down the old transport
    /// channel, this only updates the table.
    pub fn register_endpoint(&self, endpoint: Arc<Endpoint>) -> Option<Arc<Endpoint>> {
        let identity = endpoint.identity().clone();
        let previous = self.endpoints.insert(identity, endpoint.clone());
        if let Some(old) = &previous {
            warn!(
                identity = %endpoint.identity(),
                "identity collision: replacing existing endpoint registration"
            );
            let _ = old.transition(ConnectionState::Disconnected);
        }
        for hook in self.new_endpoint_hooks.lock().unwrap().iter() {
            hook(&endpoint);
        }
        previous
    }

    pub fn unregister_endpoint(&self, identity: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.remove(identity).map(|(_, endpoint)| endpoint)
    }

    pub fn get_endpoint(&self, identity: &str) -> Option<Ref<'_, EndpointId, Arc<Endpoint>>> {
        self.endpoints.get(identity)
    }

    pub fn endpoint_by_identity(&self, identity: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.get(identity).map(|e| e.clone())
    }

    pub fn identities(&self) -> Vec<EndpointId> {
        self.endpoints.iter().map(|e| e.key().clone()).collect()
    }

    pub fn connected_endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints
            .iter()
            .map(|e| e.value().clone())
            .filter(|e| e.is_connected())
            .collect()
    }

    /// Endpoints subscribed to `method` and currently connected (used by the
    /// delegation engine's `GetCheckerCandidates`, per spec §9 checking
    /// subscriptions rather than publications).
    pub fn subscribers_of(&self, method: &str) -> Vec<Arc<Endpoint>> {
        self.connected_endpoints()
            .into_iter()
            .filter(|e| e.has_subscription(method))
            .collect()
    }

    /// Binds a freshly-accepted or connected channel to a new remote endpoint,
    /// spawning the read loop that feeds inbound requests into `route_inbound`.
    pub fn add_connection(self: &Arc<Self>, channel: Box<dyn Channel>) -> Arc<Endpoint> {
        let channel: Arc<dyn Channel> = Arc::from(channel);
        let identity = channel.peer_identity();
        let endpoint = Arc::new(Endpoint::new(identity.clone(), false));
        endpoint
            .transition(ConnectionState::Connecting)
            .expect("fresh endpoint always accepts Connecting");
        self.register_endpoint(endpoint.clone());

        let manager = self.clone();
        let channel_for_loop = channel.clone();
        let endpoint_for_loop = endpoint.clone();
        tokio::spawn(async move {
            loop {
                match channel_for_loop.recv().await {
                    Ok(Some(request)) => {
                        manager.route_inbound(endpoint_for_loop.identity().clone(), request);
                    }
                    Ok(None) => break,
                    Err(error) => {
                        warn!(%error, identity = %endpoint_for_loop.identity(), "channel read failed");
                        break;
                    }
                }
            }
            let _ = endpoint_for_loop.transition(ConnectionState::Disconnected);
        });

        let manager = self.clone();
        let endpoint_for_writer = endpoint.clone();
        tokio::spawn(async move {
            manager.writer_loop(endpoint_for_writer, channel).await;
        });

        endpoint
    }

    async fn writer_loop(self: Arc<Self>, endpoint: Arc<Endpoint>, channel: Arc<dyn Channel>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(5));
        loop {
            ticker.tick().await;
            if endpoint.state() == ConnectionState::Disconnected {
                channel.close().await;
                return;
            }
            for request in endpoint.drain_outbound() {
                if let Err(error) = channel.send(request).await {
                    warn!(%error, identity = %endpoint.identity(), "failed to flush outbound message");
                }
            }
        }
    }

    /// Dispatches an inbound request, either received off the wire from a
    /// remote peer or generated locally. If the request carries an `id` that
    /// matches a pending `SendAPIMessage` call, it is treated as that call's
    /// response instead of being re-dispatched to handlers.
    pub fn route_inbound(&self, source: EndpointId, request: Request) {
        if let Some(id) = &request.id {
            if let Some((_, sender)) = self.pending_calls.remove(id.as_ref()) {
                let _ = sender.send((Some(request), false));
                return;
            }
        }
        self.dispatch_to_handlers(source, request);
    }

    fn dispatch_to_handlers(&self, source: EndpointId, request: Request) {
        let method = request.method.clone();
        if let Some(handlers) = self.handlers.get(method.as_ref()) {
            for handler in handlers.iter() {
                handler(source.clone(), request.clone());
            }
        } else {
            debug!(%method, "no handler registered for method");
        }
    }

    /// Sends a non-blocking, fire-and-forget message to exactly one endpoint.
    pub fn send_unicast(&self, target: &str, request: Request) -> Result<(), ClusterError> {
        let endpoint = self
            .endpoints
            .get(target)
            .map(|e| e.clone())
            .ok_or_else(|| ClusterError::UnknownEndpoint {
                identity: target.to_string(),
            })?;
        self.deliver(&endpoint, request);
        Ok(())
    }

    /// Sends to every connected, subscribed endpoint except `source` (spec
    /// §4.3's `{e: connected ∧ M∈subscriptions ∧ e≠source}` routing rule).
    pub fn send_multicast(&self, source: &EndpointId, request: Request) {
        for entry in self.endpoints.iter() {
            let endpoint = entry.value();
            if endpoint.identity() == source {
                continue;
            }
            if !endpoint.is_connected() {
                continue;
            }
            if !endpoint.has_subscription(&request.method) {
                continue;
            }
            self.deliver(endpoint, request.clone());
        }
    }

    fn deliver(&self, endpoint: &Arc<Endpoint>, request: Request) {
        if endpoint.is_local() {
            self.dispatch_to_handlers(endpoint.identity().clone(), request);
        } else {
            endpoint.enqueue(request);
        }
    }

    fn next_call_id(&self) -> Arc<str> {
        let id = self.next_call_id.fetch_add(1, Ordering::SeqCst);
        Arc::from(format!("call-{id}"))
    }

    /// Unicasts `request` to `target` with a generated correlation id, and
    /// resolves once either a matching reply arrives or `self.api_timeout`
    /// elapses. On timeout, returns `(None, true)` and the pending-call entry
    /// is removed so a late reply has nowhere to land.
    pub async fn send_api_message(
        self: &Arc<Self>,
        target: &str,
        mut request: Request,
    ) -> Result<(Option<Request>, bool), ClusterError> {
        let call_id = self.next_call_id();
        request.id = Some(call_id.clone());
        let (tx, rx) = oneshot::channel();
        self.pending_calls.insert(call_id.clone(), tx);
        self.send_unicast(target, request)?;

        match tokio::time::timeout(self.api_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.pending_calls.remove(&call_id);
                Ok((None, true))
            }
            Err(_) => {
                self.pending_calls.remove(&call_id);
                Ok((None, true))
            }
        }
    }

    /// Cascades shutdown: every pending `SendAPIMessage` call resolves with
    /// `timed_out = true`, and every endpoint transitions to `Disconnected`.
    pub fn shutdown(&self) {
        for entry in self.pending_calls.iter() {
            debug!(call_id = %entry.key(), "cancelling pending call on shutdown");
        }
        let pending: Vec<Arc<str>> = self.pending_calls.iter().map(|e| e.key().clone()).collect();
        for call_id in pending {
            if let Some((_, sender)) = self.pending_calls.remove(&call_id) {
                let _ = sender.send((None, true));
            }
        }
        for entry in self.endpoints.iter() {
            let _ = entry.value().transition(ConnectionState::Disconnected);
        }
    }

    pub fn known_methods(&self, identity: &str) -> (BTreeSet<MethodName>, BTreeSet<MethodName>) {
        match self.endpoint_by_identity(identity) {
            Some(endpoint) => (endpoint.publications(), endpoint.subscriptions()),
            None => (BTreeSet::new(), BTreeSet::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn new_manager(identity: &str) -> Arc<EndpointManager> {
        EndpointManager::new(identity, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn multicast_excludes_source_and_unsubscribed_peers() {
        let manager = new_manager("self");
        let received = Arc::new(AtomicUsize::new(0));

        let sub_a = Arc::new(Endpoint::new(EndpointId::from("a"), true));
        sub_a.register_subscription("checker::CheckResult");
        manager.register_endpoint(sub_a.clone());

        let unsub_b = Arc::new(Endpoint::new(EndpointId::from("b"), true));
        manager.register_endpoint(unsub_b);

        let received_clone = received.clone();
        manager.register_handler("checker::CheckResult", move |_source, _req| {
            received_clone.fetch_add(1, Ordering::SeqCst);
        });

        manager.send_multicast(
            &EndpointId::from("origin"),
            Request::new("checker::CheckResult", Default::default()),
        );

        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_api_message_times_out_without_a_reply() {
        let manager = new_manager("self");
        let target = Arc::new(Endpoint::new(EndpointId::from("peer"), false));
        target.transition(ConnectionState::Connecting).unwrap();
        target.transition(ConnectionState::Handshaking).unwrap();
        target.transition(ConnectionState::Established).unwrap();
        manager.register_endpoint(target);

        let (response, timed_out) = manager
            .send_api_message("peer", Request::new("checker::AssignService", Default::default()))
            .await
            .unwrap();
        assert!(timed_out);
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn identity_collision_disconnects_the_older_endpoint() {
        let manager = new_manager("self");
        let old = Arc::new(Endpoint::new(EndpointId::from("b"), false));
        old.transition(ConnectionState::Connecting).unwrap();
        manager.register_endpoint(old.clone());

        let new = Arc::new(Endpoint::new(EndpointId::from("b"), false));
        manager.register_endpoint(new.clone());

        assert_eq!(old.state(), ConnectionState::Disconnected);
        assert!(Arc::ptr_eq(&manager.endpoint_by_identity("b").unwrap(), &new));
    }
}
