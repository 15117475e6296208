//! Check-result ingress: accepts `checker::CheckResult` messages, discards
//! echoes of this node's own results, forwards everything else to an
//! external sink, and notifies an observer when the result carries a
//! rescheduled next-check time.
//!
//! Grounded in `examples/original_source/components/replication/replicationcomponent.cpp`'s
//! `CheckResultRequestHandler`, which is where the original groups this
//! handler — split out here into its own engine since it has nothing to do
//! with object replication beyond sharing the same wire method namespace.
//! The next-check hook is grounded in
//! `examples/original_source/lib/icinga/apiactions.cpp`'s `RescheduleCheck`,
//! which fires `Checkable::OnNextCheckUpdated` whenever a check's next-run
//! time changes; here that signal rides along on the same `check_result`
//! body rather than a separate reschedule call, since the wire method table
//! carries no dedicated reschedule message.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::codec::{EndpointId, ParamValue, Request};
use crate::manager::EndpointManager;

const METHOD_CHECK_RESULT: &str = "checker::CheckResult";

/// Receives check results this node is not the origin of. Implementations
/// typically apply them to a local service's status history.
pub trait CheckResultSink: Send + Sync + 'static {
    fn accept(&self, service: &str, result: &crate::codec::ParamMap);
}

/// A sink that does nothing; useful as a default before the hosting
/// application wires in a real status store.
pub struct NoopCheckResultSink;

impl CheckResultSink for NoopCheckResultSink {
    fn accept(&self, _service: &str, _result: &crate::codec::ParamMap) {}
}

/// Notified whenever a service's next scheduled check time changes, so an
/// external scheduler can learn of rescheduled checks without polling.
pub trait NextCheckObserver: Send + Sync + 'static {
    fn on_next_check(&self, service: &str, next_check: f64);
}

/// An observer that does nothing; the default before a hosting application
/// wires in a real scheduler.
pub struct NoopNextCheckObserver;

impl NextCheckObserver for NoopNextCheckObserver {
    fn on_next_check(&self, _service: &str, _next_check: f64) {}
}

#[derive(Default)]
pub struct CheckerStats {
    pub accepted: AtomicU64,
    pub echoes_discarded: AtomicU64,
}

/// Subscribes to `checker::CheckResult` and applies the echo-suppression rule:
/// a result whose `current_checker` matches this node's own identity
/// originated here and must not be re-applied.
pub struct CheckerIngress {
    manager: Arc<EndpointManager>,
    sink: Arc<dyn CheckResultSink>,
    next_check: Arc<dyn NextCheckObserver>,
    stats: Arc<CheckerStats>,
}

impl CheckerIngress {
    pub fn new(manager: Arc<EndpointManager>, sink: Arc<dyn CheckResultSink>) -> Arc<Self> {
        Self::with_next_check_observer(manager, sink, Arc::new(NoopNextCheckObserver))
    }

    pub fn with_next_check_observer(
        manager: Arc<EndpointManager>,
        sink: Arc<dyn CheckResultSink>,
        next_check: Arc<dyn NextCheckObserver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            manager,
            sink,
            next_check,
            stats: Arc::new(CheckerStats::default()),
        })
    }

    pub fn stats(&self) -> Arc<CheckerStats> {
        self.stats.clone()
    }

    pub fn start(self: &Arc<Self>) {
        let this = self.clone();
        self.manager.register_handler(METHOD_CHECK_RESULT, move |source, request| {
            this.check_result_handler(source, request);
        });
    }

    fn check_result_handler(&self, _source: EndpointId, request: Request) {
        let Some(service) = request.get("service").and_then(ParamValue::as_str) else {
            return;
        };
        let Some(result) = request.get("check_result").and_then(ParamValue::as_map) else {
            return;
        };

        if let Some(current_checker) = result.get("current_checker").and_then(ParamValue::as_str) {
            if current_checker == self.manager.self_identity().as_ref() {
                debug!(%service, "discarding check result echo of our own origination");
                self.stats.echoes_discarded.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        self.sink.accept(service, result);
        self.stats.accepted.fetch_add(1, Ordering::Relaxed);

        if let Some(next_check) = result.get("next_check").and_then(ParamValue::as_double) {
            self.next_check.on_next_check(service, next_check);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ParamMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingSink {
        seen: Mutex<Vec<String>>,
    }

    impl CheckResultSink for RecordingSink {
        fn accept(&self, service: &str, _result: &ParamMap) {
            self.seen.lock().unwrap().push(service.to_string());
        }
    }

    fn request(current_checker: &str) -> Request {
        let mut result = ParamMap::new();
        result.insert("current_checker".into(), ParamValue::from(current_checker));
        let mut params = ParamMap::new();
        params.insert("service".into(), ParamValue::from("web1"));
        params.insert("check_result".into(), ParamValue::Map(result));
        Request::new(METHOD_CHECK_RESULT, params)
    }

    struct RecordingNextCheckObserver {
        seen: Mutex<Vec<(String, f64)>>,
    }

    impl NextCheckObserver for RecordingNextCheckObserver {
        fn on_next_check(&self, service: &str, next_check: f64) {
            self.seen.lock().unwrap().push((service.to_string(), next_check));
        }
    }

    #[test]
    fn discards_echo_of_our_own_result() {
        let manager = EndpointManager::new("self", Duration::from_secs(1));
        let sink = Arc::new(RecordingSink { seen: Mutex::new(Vec::new()) });
        let ingress = CheckerIngress::new(manager, sink.clone());

        ingress.check_result_handler(EndpointId::from("peer"), request("self"));

        assert!(sink.seen.lock().unwrap().is_empty());
        assert_eq!(ingress.stats().echoes_discarded.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn forwards_results_from_other_checkers() {
        let manager = EndpointManager::new("self", Duration::from_secs(1));
        let sink = Arc::new(RecordingSink { seen: Mutex::new(Vec::new()) });
        let ingress = CheckerIngress::new(manager, sink.clone());

        ingress.check_result_handler(EndpointId::from("peer"), request("peer"));

        assert_eq!(sink.seen.lock().unwrap().as_slice(), ["web1"]);
        assert_eq!(ingress.stats().accepted.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn notifies_next_check_observer_when_result_carries_one() {
        let manager = EndpointManager::new("self", Duration::from_secs(1));
        let sink = Arc::new(RecordingSink { seen: Mutex::new(Vec::new()) });
        let observer = Arc::new(RecordingNextCheckObserver { seen: Mutex::new(Vec::new()) });
        let ingress = CheckerIngress::with_next_check_observer(manager, sink, observer.clone());

        let mut result = ParamMap::new();
        result.insert("current_checker".into(), ParamValue::from("peer"));
        result.insert("next_check".into(), ParamValue::Double(1_700_000_000.0));
        let mut params = ParamMap::new();
        params.insert("service".into(), ParamValue::from("web1"));
        params.insert("check_result".into(), ParamValue::Map(result));

        ingress.check_result_handler(EndpointId::from("peer"), Request::new(METHOD_CHECK_RESULT, params));

        assert_eq!(observer.seen.lock().unwrap().as_slice(), [("web1".to_string(), 1_700_000_000.0)]);
    }
}
