//! A cluster peer: identity, connection lifecycle, publication/subscription sets
//! and an outbound queue.
//!
//! Grounded in `spark-switch::core::session::CallSession`'s state-machine shape
//! (`can_transition_to` + explicit invalid-transition error) and in
//! `examples/original_source/components/discovery/discoverycomponent.cpp`'s
//! `NewEndpointHandler`/`WelcomeMessageHandler`/`FinishDiscoverySetup` for the
//! welcome-flag bookkeeping.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use spark_core::transport::Endpoint as ReconnectAddress;
use tracing::warn;

use crate::codec::{EndpointId, MethodName, Request};
use crate::error::ClusterError;

/// Connection lifecycle of a cluster peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Established,
}

impl ConnectionState {
    /// Valid forward transitions plus the universal "drop to Disconnected" escape
    /// hatch every state allows.
    pub fn can_transition_to(self, target: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, target) {
            (_, Disconnected) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Handshaking) => true,
            (Handshaking, Established) => true,
            _ => false,
        }
    }
}

pub type SessionCallback = Box<dyn Fn(&Endpoint) + Send + Sync>;

/// The outbound queue backing a remote endpoint's `send`.
///
/// Bounded with an oldest-drop overflow policy (spec §5): a slow or stalled peer
/// never causes a caller of `send` to block, and never causes unbounded memory
/// growth — it just starts losing its own least-recent backlog.
struct OutboundQueue {
    capacity: usize,
    items: Mutex<VecDeque<Request>>,
}

impl OutboundQueue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
        }
    }

    fn push(&self, request: Request) {
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.capacity {
            if items.pop_front().is_some() {
                warn!("outbound queue at capacity, dropping oldest pending message");
            }
        }
        items.push_back(request);
    }

    fn drain(&self) -> Vec<Request> {
        let mut items = self.items.lock().unwrap();
        items.drain(..).collect()
    }
}

/// Default outbound queue depth for a newly-constructed remote endpoint.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A cluster peer: either `local` (a bookkeeping handle used by an engine running
/// in this same process, e.g. the discovery/replication/delegation engines'
/// own endpoints) or remote (backed by a transport [`Channel`](crate::transport::Channel)).
pub struct Endpoint {
    identity: EndpointId,
    local: bool,
    state: Mutex<ConnectionState>,
    publications: Mutex<BTreeSet<MethodName>>,
    subscriptions: Mutex<BTreeSet<MethodName>>,
    welcome_sent: AtomicBool,
    welcome_received: AtomicBool,
    session_established_fired: AtomicBool,
    callbacks: Mutex<Vec<SessionCallback>>,
    address: Mutex<Option<ReconnectAddress>>,
    outbound: OutboundQueue,
}

impl Endpoint {
    pub fn new(identity: EndpointId, local: bool) -> Self {
        let endpoint = Self {
            identity,
            local,
            state: Mutex::new(if local {
                ConnectionState::Established
            } else {
                ConnectionState::Disconnected
            }),
            publications: Mutex::new(BTreeSet::new()),
            subscriptions: Mutex::new(BTreeSet::new()),
            welcome_sent: AtomicBool::new(local),
            welcome_received: AtomicBool::new(local),
            session_established_fired: AtomicBool::new(false),
            callbacks: Mutex::new(Vec::new()),
            address: Mutex::new(None),
            outbound: OutboundQueue::new(DEFAULT_QUEUE_CAPACITY),
        };
        if local {
            // Local endpoints never go through a handshake; the session is
            // considered established the instant the endpoint exists.
            endpoint.session_established_fired.store(true, Ordering::SeqCst);
        }
        endpoint
    }

    pub fn identity(&self) -> &EndpointId {
        &self.identity
    }

    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state(), ConnectionState::Established) || self.local
    }

    pub fn set_reconnect_address(&self, address: ReconnectAddress) {
        *self.address.lock().unwrap() = Some(address);
    }

    pub fn reconnect_address(&self) -> Option<ReconnectAddress> {
        self.address.lock().unwrap().clone()
    }

    pub fn register_publication(&self, method: impl Into<MethodName>) {
        self.publications.lock().unwrap().insert(method.into());
    }

    pub fn register_subscription(&self, method: impl Into<MethodName>) {
        self.subscriptions.lock().unwrap().insert(method.into());
    }

    pub fn has_publication(&self, method: &str) -> bool {
        self.publications.lock().unwrap().contains(method)
    }

    pub fn has_subscription(&self, method: &str) -> bool {
        self.subscriptions.lock().unwrap().contains(method)
    }

    pub fn publications(&self) -> BTreeSet<MethodName> {
        self.publications.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> BTreeSet<MethodName> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Attempts a state transition, returning an error if it is not permitted from
    /// the current state.
    pub fn transition(&self, target: ConnectionState) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        if !state.can_transition_to(target) {
            return Err(ClusterError::InvalidTransition {
                identity: self.identity.to_string(),
                state: *state,
                target,
            });
        }
        *state = target;
        if target == ConnectionState::Established {
            drop(state);
            self.maybe_fire_session_established();
        } else if target == ConnectionState::Disconnected {
            self.session_established_fired.store(false, Ordering::SeqCst);
            self.welcome_sent.store(false, Ordering::SeqCst);
            self.welcome_received.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    pub fn mark_welcome_sent(&self) {
        self.welcome_sent.store(true, Ordering::SeqCst);
        self.maybe_fire_session_established();
    }

    pub fn mark_welcome_received(&self) {
        self.welcome_received.store(true, Ordering::SeqCst);
        self.maybe_fire_session_established();
    }

    pub fn welcome_sent(&self) -> bool {
        self.welcome_sent.load(Ordering::SeqCst)
    }

    pub fn welcome_received(&self) -> bool {
        self.welcome_received.load(Ordering::SeqCst)
    }

    /// Registers a callback fired once, the first time this endpoint's connection
    /// reaches `Established` with both welcome flags set. For local endpoints this
    /// fires synchronously, inline, before this call returns.
    pub fn on_session_established(&self, callback: SessionCallback) {
        if self.local || self.session_established_fired.load(Ordering::SeqCst) {
            callback(self);
            return;
        }
        self.callbacks.lock().unwrap().push(callback);
    }

    fn maybe_fire_session_established(&self) {
        if self.state() != ConnectionState::Established {
            return;
        }
        if !(self.welcome_sent() && self.welcome_received()) {
            return;
        }
        if self
            .session_established_fired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let callbacks = std::mem::take(&mut *self.callbacks.lock().unwrap());
        for callback in callbacks {
            callback(self);
        }
    }

    /// Non-blocking, fire-and-forget enqueue onto this endpoint's outbound queue.
    /// Remote endpoints: appended to the bounded, oldest-drop queue, to be flushed
    /// by the manager's writer task. Local endpoints have no queue of their own —
    /// the manager dispatches local sends synchronously through its handler table
    /// instead of calling this method.
    pub fn enqueue(&self, request: Request) {
        debug_assert!(!self.local, "local endpoints are dispatched, not queued");
        self.outbound.push(request);
    }

    pub fn drain_outbound(&self) -> Vec<Request> {
        self.outbound.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EndpointId {
        EndpointId::from(s)
    }

    #[test]
    fn local_endpoint_fires_session_established_synchronously() {
        let endpoint = Endpoint::new(id("local"), true);
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        endpoint.on_session_established(Box::new(move |_| {
            fired2.store(true, Ordering::SeqCst);
        }));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn remote_endpoint_fires_once_after_both_welcome_flags() {
        let endpoint = Endpoint::new(id("remote"), false);
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let count2 = count.clone();
        endpoint.on_session_established(Box::new(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        }));

        endpoint.transition(ConnectionState::Connecting).unwrap();
        endpoint.transition(ConnectionState::Handshaking).unwrap();
        endpoint.mark_welcome_sent();
        assert_eq!(count.load(Ordering::SeqCst), 0, "not established yet");

        endpoint.transition(ConnectionState::Established).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0, "welcome not yet received");

        endpoint.mark_welcome_received();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Firing again must not re-invoke the callback.
        endpoint.mark_welcome_received();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let endpoint = Endpoint::new(id("remote"), false);
        let err = endpoint.transition(ConnectionState::Established).unwrap_err();
        assert!(matches!(err, ClusterError::InvalidTransition { .. }));
    }

    #[test]
    fn outbound_queue_drops_oldest_under_pressure() {
        let endpoint = Endpoint::new(id("remote"), false);
        for i in 0..(DEFAULT_QUEUE_CAPACITY + 5) {
            endpoint.enqueue(Request::new("checker::CheckResult", Default::default()).with_id(i.to_string()));
        }
        let drained = endpoint.drain_outbound();
        assert_eq!(drained.len(), DEFAULT_QUEUE_CAPACITY);
        assert_eq!(drained.first().unwrap().id.as_deref(), Some("5"));
    }
}
