//! The in-memory dynamic object store backing configuration replication.
//!
//! Grounded in `examples/original_source/components/replication/replicationcomponent.cpp`
//! (`MakeObjectMessage`, `RemoteObjectUpdateHandler`, `RemoteObjectRemovedHandler`)
//! and the per-type RW-lock sharing model described for the object store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::codec::{EndpointId, ParamMap};

/// Attribute classes a dynamic object's properties are grouped into. Only
/// `Config` and `Replicated` attributes are ever sent over the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeClass {
    Config,
    State,
    Replicated,
    Local,
}

/// Bitmask over [`AttributeClass`], used by `BuildUpdate` to select which
/// attribute classes to include.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttributeMask(u8);

impl AttributeMask {
    pub const NONE: AttributeMask = AttributeMask(0);

    pub const fn of(class: AttributeClass) -> Self {
        AttributeMask(1 << class as u8)
    }

    pub const fn all_replicated() -> Self {
        let config = Self::of(AttributeClass::Config).0;
        let replicated = Self::of(AttributeClass::Replicated).0;
        AttributeMask(config | replicated)
    }

    pub const fn contains(self, class: AttributeClass) -> bool {
        self.0 & Self::of(class).0 != 0
    }

    pub const fn union(self, other: AttributeMask) -> AttributeMask {
        AttributeMask(self.0 | other.0)
    }
}

/// Monotonic transaction counter, used to version every mutation applied to an
/// object and to bound a `BuildUpdate(sinceTx, ...)` diff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

/// Identifies an object's type (e.g. `"service"`) and name within that type.
pub type ObjectType = String;
pub type ObjectName = String;

/// Origin of an update applied to an object — threaded explicitly through the
/// replication call chain rather than kept in a process-wide mutable flag, so
/// concurrently-running per-endpoint handler tasks cannot race on it (spec §9).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote(EndpointId),
}

impl Origin {
    pub fn is_remote_from(&self, identity: &str) -> bool {
        matches!(self, Origin::Remote(id) if id.as_ref() == identity)
    }
}

/// A single dynamic, replicable object (e.g. a `service` check object).
#[derive(Clone, Debug)]
pub struct DynamicObject {
    pub object_type: ObjectType,
    pub name: ObjectName,
    attributes: BTreeMap<String, (AttributeClass, ParamMap)>,
    /// Identity this object's state was last written by, if it originated
    /// remotely. `None` means the object is authoritatively local.
    pub source: Option<EndpointId>,
    pub transaction: TransactionId,
    pub is_local: bool,
}

impl DynamicObject {
    pub fn new_local(object_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
            source: None,
            transaction: TransactionId(0),
            is_local: true,
        }
    }

    pub fn new_remote(
        object_type: impl Into<String>,
        name: impl Into<String>,
        source: EndpointId,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
            source: Some(source),
            transaction: TransactionId(0),
            is_local: false,
        }
    }

    pub fn key(&self) -> (ObjectType, ObjectName) {
        (self.object_type.clone(), self.name.clone())
    }

    pub fn set_attribute(&mut self, class: AttributeClass, key: impl Into<String>, value: ParamMap) {
        self.attributes.insert(key.into(), (class, value));
    }

    /// Builds a diff of this object's attributes matching `mask`, ignoring
    /// `since` (this in-memory implementation keeps no per-attribute history —
    /// every call returns the full current value of the selected classes,
    /// which is always a superset of what a true incremental diff would send).
    pub fn build_update(&self, _since: TransactionId, mask: AttributeMask) -> ParamMap {
        let mut out = ParamMap::new();
        for (key, (class, value)) in &self.attributes {
            if mask.contains(*class) {
                out.insert(key.clone(), crate::codec::ParamValue::Map(value.clone()));
            }
        }
        out
    }

    pub fn apply_update(&mut self, update: &ParamMap, transaction: TransactionId) {
        for (key, value) in update {
            if let crate::codec::ParamValue::Map(inner) = value {
                self.attributes
                    .insert(key.clone(), (AttributeClass::Replicated, inner.clone()));
            }
        }
        self.transaction = transaction;
    }
}

/// Result of registering an object: whether it was newly created or updated an
/// object that already existed under the same `(type, name)` key.
#[derive(Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    AlreadyExists,
}

/// Per-type RW-locked dynamic object store. One `RwLock<BTreeMap<..>>` per
/// object type, so readers iterating objects of type `service` never block
/// writers registering a new `host`.
#[derive(Default)]
pub struct ObjectStore {
    types: RwLock<BTreeMap<ObjectType, RwLock<BTreeMap<ObjectName, DynamicObject>>>>,
    next_transaction: AtomicU64,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_transaction(&self) -> TransactionId {
        TransactionId(self.next_transaction.fetch_add(1, Ordering::SeqCst))
    }

    pub fn register(&self, object: DynamicObject) -> RegisterOutcome {
        let object_type = object.object_type.clone();
        {
            let types = self.types.read().unwrap();
            if let Some(bucket) = types.get(&object_type) {
                if bucket.read().unwrap().contains_key(&object.name) {
                    return RegisterOutcome::AlreadyExists;
                }
            }
        }
        let mut types = self.types.write().unwrap();
        let bucket = types.entry(object_type).or_insert_with(|| RwLock::new(BTreeMap::new()));
        let mut objects = bucket.write().unwrap();
        if objects.contains_key(&object.name) {
            return RegisterOutcome::AlreadyExists;
        }
        objects.insert(object.name.clone(), object);
        RegisterOutcome::Created
    }

    pub fn unregister(&self, object_type: &str, name: &str) -> Option<DynamicObject> {
        let types = self.types.read().unwrap();
        types.get(object_type)?.write().unwrap().remove(name)
    }

    pub fn get(&self, object_type: &str, name: &str) -> Option<DynamicObject> {
        let types = self.types.read().unwrap();
        types.get(object_type)?.read().unwrap().get(name).cloned()
    }

    pub fn contains(&self, object_type: &str, name: &str) -> bool {
        let types = self.types.read().unwrap();
        types
            .get(object_type)
            .map(|bucket| bucket.read().unwrap().contains_key(name))
            .unwrap_or(false)
    }

    pub fn with_mut<R>(
        &self,
        object_type: &str,
        name: &str,
        f: impl FnOnce(&mut DynamicObject) -> R,
    ) -> Option<R> {
        let types = self.types.read().unwrap();
        let bucket = types.get(object_type)?;
        let mut objects = bucket.write().unwrap();
        objects.get_mut(name).map(f)
    }

    /// Every object across every type, in `(type, name)` order. Used by
    /// `FetchObjects` (config replication initial sync).
    pub fn all_objects(&self) -> Vec<DynamicObject> {
        let types = self.types.read().unwrap();
        let mut out = Vec::new();
        for bucket in types.values() {
            out.extend(bucket.read().unwrap().values().cloned());
        }
        out
    }

    pub fn objects_of_type(&self, object_type: &str) -> Vec<DynamicObject> {
        let types = self.types.read().unwrap();
        types
            .get(object_type)
            .map(|bucket| bucket.read().unwrap().values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_duplicate_is_rejected() {
        let store = ObjectStore::new();
        assert_eq!(
            store.register(DynamicObject::new_local("service", "web1")),
            RegisterOutcome::Created
        );
        assert_eq!(
            store.register(DynamicObject::new_local("service", "web1")),
            RegisterOutcome::AlreadyExists
        );
    }

    #[test]
    fn build_update_only_includes_masked_classes() {
        let mut object = DynamicObject::new_local("service", "web1");
        let mut config = ParamMap::new();
        config.insert("check_interval".into(), crate::codec::ParamValue::Int(60));
        object.set_attribute(AttributeClass::Config, "check", config);
        let mut state = ParamMap::new();
        state.insert("last_state".into(), crate::codec::ParamValue::Int(0));
        object.set_attribute(AttributeClass::State, "status", state);

        let update = object.build_update(TransactionId(0), AttributeMask::of(AttributeClass::Config));
        assert!(update.contains_key("check"));
        assert!(!update.contains_key("status"));
    }

    #[test]
    fn fetch_objects_iterates_every_type() {
        let store = ObjectStore::new();
        store.register(DynamicObject::new_local("host", "h1"));
        store.register(DynamicObject::new_local("service", "h1-ping"));
        let all = store.all_objects();
        assert_eq!(all.len(), 2);
    }
}
