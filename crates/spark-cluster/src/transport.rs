//! Transport abstraction: connect/listen/read/write/close over a bidirectional,
//! framed, already-authenticated channel.
//!
//! The manager and engines in this crate only ever depend on [`Channel`] and
//! [`Listener`]; nothing here knows about TCP, TLS or QUIC. Production wiring
//! plugs a concrete transport (e.g. `spark-transport-tcp`) in behind these
//! traits; tests use [`InMemoryChannel`].

use async_trait::async_trait;

use crate::codec::{EndpointId, Request};
use crate::error::ClusterError;

/// A bidirectional, message-framed channel to one already-authenticated peer.
///
/// Authentication and framing are assumed to have already happened by the time a
/// `Channel` exists; this crate's concern starts at the level of `Request` values.
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Identity the transport layer authenticated this peer as.
    fn peer_identity(&self) -> EndpointId;

    async fn send(&self, request: Request) -> Result<(), ClusterError>;

    /// Waits for the next inbound request. Returns `Ok(None)` when the peer closed
    /// the channel in an orderly fashion.
    async fn recv(&self) -> Result<Option<Request>, ClusterError>;

    async fn close(&self);
}

/// A listening socket that yields newly-accepted, already-authenticated channels.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    async fn accept(&self) -> Result<Box<dyn Channel>, ClusterError>;
}

/// Connects outbound to a (node, service) address, yielding an authenticated channel.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, node: &str, service: &str) -> Result<Box<dyn Channel>, ClusterError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod in_memory {
    use super::*;
    use tokio::sync::Mutex;
    use tokio::sync::mpsc;

    /// An in-process channel pair, used by tests to exercise the manager/engines
    /// without any real sockets. `pair` wires two ends together so sends on one
    /// side show up as `recv()`s on the other.
    pub struct InMemoryChannel {
        identity: EndpointId,
        outbound: mpsc::UnboundedSender<Request>,
        inbound: Mutex<mpsc::UnboundedReceiver<Request>>,
    }

    impl InMemoryChannel {
        pub fn pair(a_identity: EndpointId, b_identity: EndpointId) -> (Self, Self) {
            let (a_to_b_tx, a_to_b_rx) = mpsc::unbounded_channel();
            let (b_to_a_tx, b_to_a_rx) = mpsc::unbounded_channel();
            let a = InMemoryChannel {
                identity: b_identity,
                outbound: a_to_b_tx,
                inbound: Mutex::new(b_to_a_rx),
            };
            let b = InMemoryChannel {
                identity: a_identity,
                outbound: b_to_a_tx,
                inbound: Mutex::new(a_to_b_rx),
            };
            (a, b)
        }
    }

    #[async_trait]
    impl Channel for InMemoryChannel {
        fn peer_identity(&self) -> EndpointId {
            self.identity.clone()
        }

        async fn send(&self, request: Request) -> Result<(), ClusterError> {
            self.outbound
                .send(request)
                .map_err(|_| ClusterError::Transport {
                    identity: self.identity.to_string(),
                    detail: "peer channel closed".into(),
                })
        }

        async fn recv(&self) -> Result<Option<Request>, ClusterError> {
            Ok(self.inbound.lock().await.recv().await)
        }

        async fn close(&self) {
            self.inbound.lock().await.close();
        }
    }
}
