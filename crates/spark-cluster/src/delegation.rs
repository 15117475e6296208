//! Check delegation: histogram-balanced assignment of services to checker
//! endpoints, session-established cleanup, and the periodic rebalancing timer.
//!
//! Grounded in `examples/original_source/components/delegation/delegationcomponent.cpp`
//! (`DelegationTimerHandler`, `GetCheckerCandidates`, `SessionEstablishedHandler`).
//! Eligibility is checked against a candidate's *subscriptions*, not its
//! publications — [`EndpointManager::subscribers_of`] already implements that
//! routing rule.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::thread_rng;
use tracing::{debug, info, warn};

use crate::codec::{EndpointId, ParamMap, ParamValue, Request};
use crate::endpoint::Endpoint;
use crate::manager::EndpointManager;
use crate::object_store::{AttributeMask, DynamicObject, ObjectStore, ObjectName};

const METHOD_ASSIGN_SERVICE: &str = "checker::AssignService";
const METHOD_CLEAR_SERVICES: &str = "checker::ClearServices";
const SERVICE_OBJECT_TYPE: &str = "service";

/// Owns the runtime checker-assignment map (which endpoint currently checks
/// which service) and the timer that keeps it balanced.
pub struct DelegationEngine {
    manager: Arc<EndpointManager>,
    store: Arc<ObjectStore>,
    interval: std::time::Duration,
    checkers: DashMap<ObjectName, EndpointId>,
}

impl DelegationEngine {
    pub fn new(manager: Arc<EndpointManager>, store: Arc<ObjectStore>, interval: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            manager,
            store,
            interval,
            checkers: DashMap::new(),
        })
    }

    pub fn start(self: &Arc<Self>) {
        let this = self.clone();
        self.manager.on_new_endpoint(move |endpoint| {
            this.hook_new_endpoint(endpoint);
        });

        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.interval);
            loop {
                interval.tick().await;
                this.run_delegation_sweep().await;
            }
        });
    }

    pub fn checker_of(&self, service_name: &str) -> Option<EndpointId> {
        self.checkers.get(service_name).map(|e| e.clone())
    }

    fn hook_new_endpoint(self: &Arc<Self>, endpoint: &Arc<Endpoint>) {
        let this = self.clone();
        endpoint.on_session_established(Box::new(move |established| {
            this.session_established_handler(established);
        }));
    }

    /// Clears every service this endpoint was checking (locally and on the
    /// endpoint itself), run the moment a session reaches `Established`.
    fn session_established_handler(&self, endpoint: &Endpoint) {
        let identity = endpoint.identity().clone();
        info!(%identity, "clearing assigned services for endpoint");

        let cleared: Vec<ObjectName> = self
            .checkers
            .iter()
            .filter(|e| e.value().as_ref() == identity.as_ref())
            .map(|e| e.key().clone())
            .collect();
        for name in cleared {
            self.checkers.remove(&name);
        }

        self.clear_services(&identity);
    }

    fn clear_services(&self, checker: &str) {
        if let Err(error) = self
            .manager
            .send_unicast(checker, Request::new(METHOD_CLEAR_SERVICES, ParamMap::new()))
        {
            debug!(%error, %checker, "failed to send checker::ClearServices");
        }
    }

    fn checker_candidates(&self) -> Vec<Arc<Endpoint>> {
        self.manager.subscribers_of(METHOD_ASSIGN_SERVICE)
    }

    fn build_assign_request(&self, service: &DynamicObject) -> Request {
        let mut params = ParamMap::new();
        params.insert("name".into(), ParamValue::from(service.name.as_str()));
        params.insert("type".into(), ParamValue::from(service.object_type.as_str()));
        params.insert(
            "service".into(),
            ParamValue::Map(service.build_update(service.transaction, AttributeMask::all_replicated())),
        );
        Request::new(METHOD_ASSIGN_SERVICE, params)
    }

    /// Unicasts a `checker::AssignService` call and, if the designated checker
    /// for the service hasn't since changed, reacts to its outcome: a timeout
    /// clears the assignment so the next sweep can try a different candidate.
    async fn assign_service(self: &Arc<Self>, checker: EndpointId, service: DynamicObject) {
        debug!(service = %service.name, checker = %checker, "delegating service");
        let request = self.build_assign_request(&service);
        let response = match self.manager.send_api_message(&checker, request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, %checker, "assign_service call failed to send");
                return;
            }
        };
        let (_reply, timed_out) = response;

        if self.checker_of(&service.name).as_deref() != Some(checker.as_ref()) {
            return;
        }
        if timed_out {
            info!(service = %service.name, %checker, "service delegation timed out");
            self.checkers.remove(&service.name);
        }
    }

    /// Runs one rebalancing sweep immediately, outside of the timer loop.
    /// `start()` calls this on every tick; exposed directly so a host can
    /// force an out-of-band rebalance (e.g. right after a bulk config load).
    pub async fn run_delegation_sweep(self: &Arc<Self>) {
        let mut histogram: BTreeMap<EndpointId, i64> = BTreeMap::new();
        for identity in self.manager.identities() {
            histogram.insert(identity, 0);
        }

        let mut services = self.store.objects_of_type(SERVICE_OBJECT_TYPE);
        for service in &services {
            let Some(checker) = self.checker_of(&service.name) else {
                continue;
            };
            if self.manager.endpoint_by_identity(&checker).is_some() {
                *histogram.entry(checker).or_insert(0) += 1;
            }
        }

        let mut rng = thread_rng();
        services.shuffle(&mut rng);

        let mut need_clear = false;
        let mut delegated = 0usize;

        for service in &services {
            let current_checker = self.checker_of(&service.name);
            let old_endpoint = current_checker
                .as_ref()
                .and_then(|c| self.manager.endpoint_by_identity(c));

            let mut candidates = self.checker_candidates();
            candidates.shuffle(&mut rng);

            let (avg_services, overflow_tolerance) = if candidates.is_empty() {
                (0i64, 0i64)
            } else {
                let total: i64 = candidates
                    .iter()
                    .map(|c| *histogram.get(c.identity()).unwrap_or(&0))
                    .sum();
                (total / candidates.len() as i64, candidates.len() as i64 * 2)
            };

            let keep_current = old_endpoint.as_ref().is_some_and(|old| {
                candidates.iter().any(|c| Arc::ptr_eq(c, old))
                    && *histogram.get(old.identity()).unwrap_or(&0) <= avg_services + overflow_tolerance
            });
            if keep_current {
                continue;
            }

            if let Some(old_checker) = &current_checker {
                need_clear = true;
                self.checkers.remove(&service.name);
                if old_endpoint.is_some() {
                    *histogram.entry(old_checker.clone()).or_insert(0) -= 1;
                }
            }

            for candidate in &candidates {
                let count = *histogram.get(candidate.identity()).unwrap_or(&0);
                if count > avg_services {
                    continue;
                }
                self.checkers.insert(service.name.clone(), candidate.identity().clone());
                *histogram.entry(candidate.identity().clone()).or_insert(0) += 1;
                delegated += 1;
                break;
            }
        }

        if delegated > 0 {
            if need_clear {
                for identity in histogram.keys() {
                    self.clear_services(identity);
                }
            }

            for service in services {
                let Some(checker) = self.checker_of(&service.name) else {
                    continue;
                };
                if self.manager.endpoint_by_identity(&checker).is_none() {
                    continue;
                }
                let this = self.clone();
                tokio::spawn(async move {
                    this.assign_service(checker, service).await;
                });
            }

            for (identity, count) in &histogram {
                info!(%identity, services = count, "delegation histogram");
            }
        }

        info!(delegated, "delegation sweep complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn setup() -> (Arc<EndpointManager>, Arc<ObjectStore>, Arc<DelegationEngine>) {
        let manager = EndpointManager::new("self", Duration::from_millis(200));
        let store = Arc::new(ObjectStore::new());
        let engine = DelegationEngine::new(manager.clone(), store.clone(), Duration::from_secs(30));
        (manager, store, engine)
    }

    fn connected_candidate(manager: &Arc<EndpointManager>, identity: &str) -> Arc<Endpoint> {
        let endpoint = Arc::new(Endpoint::new(EndpointId::from(identity), false));
        endpoint.transition(crate::endpoint::ConnectionState::Connecting).unwrap();
        endpoint.transition(crate::endpoint::ConnectionState::Handshaking).unwrap();
        endpoint.transition(crate::endpoint::ConnectionState::Established).unwrap();
        endpoint.register_subscription(METHOD_ASSIGN_SERVICE);
        manager.register_endpoint(endpoint.clone());
        endpoint
    }

    #[tokio::test]
    async fn assigns_unclaimed_service_to_a_sole_candidate() {
        let (manager, store, engine) = setup();
        connected_candidate(&manager, "checker-a");
        store.register(DynamicObject::new_local("service", "web1"));

        engine.run_delegation_sweep().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(engine.checker_of("web1").as_deref(), Some("checker-a"));
    }

    #[tokio::test]
    async fn session_established_clears_previously_assigned_services() {
        let (manager, store, engine) = setup();
        let candidate = connected_candidate(&manager, "checker-a");
        store.register(DynamicObject::new_local("service", "web1"));
        engine.checkers.insert("web1".into(), EndpointId::from("checker-a"));

        engine.session_established_handler(&candidate);

        assert!(engine.checker_of("web1").is_none());
    }

    #[tokio::test]
    async fn candidates_without_subscription_are_ignored() {
        let (manager, store, engine) = setup();
        let endpoint = Arc::new(Endpoint::new(EndpointId::from("not-a-checker"), false));
        endpoint.transition(crate::endpoint::ConnectionState::Connecting).unwrap();
        endpoint.transition(crate::endpoint::ConnectionState::Handshaking).unwrap();
        endpoint.transition(crate::endpoint::ConnectionState::Established).unwrap();
        manager.register_endpoint(endpoint);
        store.register(DynamicObject::new_local("service", "web1"));

        engine.run_delegation_sweep().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(engine.checker_of("web1").is_none());
    }
}
