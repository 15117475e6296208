//! In-memory message representation shared by every engine in this crate.
//!
//! Wire encoding is an external concern (see [`crate::transport`]); this module only
//! defines the leaf value union and the request envelope that the discovery,
//! replication and delegation engines build and consume.

use std::{collections::BTreeMap, sync::Arc};

/// Cheap-clone endpoint identity, interned once at registration time.
pub type EndpointId = Arc<str>;

/// Cheap-clone method name (`"config::ObjectUpdate"`, `"checker::AssignService"`, ...).
pub type MethodName = Arc<str>;

/// A single leaf value carried by a [`ParamMap`].
///
/// Reading a key that is absent from a [`ParamMap`] is never an error — callers get
/// `None` back and decide for themselves whether that is meaningful.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<ParamValue>),
    Map(ParamMap),
}

impl ParamValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            ParamValue::Double(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ParamMap> {
        match self {
            ParamValue::Map(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::String(v)
    }
}

/// Ordered key/value parameter bag. `BTreeMap` keeps iteration order stable, which
/// matters for the replication engine's diff-oriented logging.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// A codec-level request: a method name, an optional correlation id, and its
/// parameters. The `id` field is present for calls that expect a response
/// (`SendAPIMessage`) and absent for fire-and-forget notifications.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub method: MethodName,
    pub id: Option<Arc<str>>,
    pub params: ParamMap,
}

impl Request {
    pub fn new(method: impl Into<MethodName>, params: ParamMap) -> Self {
        Self {
            method: method.into(),
            id: None,
            params,
        }
    }

    pub fn with_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }
}

#[cfg(feature = "std_json")]
mod json {
    use super::{ParamMap, ParamValue};

    impl From<&ParamValue> for serde_json::Value {
        fn from(value: &ParamValue) -> Self {
            match value {
                ParamValue::Null => serde_json::Value::Null,
                ParamValue::Bool(v) => serde_json::Value::Bool(*v),
                ParamValue::Int(v) => serde_json::Value::from(*v),
                ParamValue::Double(v) => serde_json::json!(v),
                ParamValue::String(v) => serde_json::Value::String(v.clone()),
                ParamValue::List(items) => {
                    serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
                }
                ParamValue::Map(map) => serde_json::Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                        .collect(),
                ),
            }
        }
    }

    impl From<&serde_json::Value> for ParamValue {
        fn from(value: &serde_json::Value) -> Self {
            match value {
                serde_json::Value::Null => ParamValue::Null,
                serde_json::Value::Bool(v) => ParamValue::Bool(*v),
                serde_json::Value::Number(n) => n
                    .as_i64()
                    .map(ParamValue::Int)
                    .or_else(|| n.as_f64().map(ParamValue::Double))
                    .unwrap_or(ParamValue::Null),
                serde_json::Value::String(v) => ParamValue::String(v.clone()),
                serde_json::Value::Array(items) => {
                    ParamValue::List(items.iter().map(ParamValue::from).collect())
                }
                serde_json::Value::Object(map) => {
                    let mut out = ParamMap::new();
                    for (k, v) in map {
                        out.insert(k.clone(), ParamValue::from(v));
                    }
                    ParamValue::Map(out)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_none_not_error() {
        let req = Request::new("discovery::RegisterComponent", ParamMap::new());
        assert_eq!(req.get("identity"), None);
    }

    #[test]
    fn round_trips_through_nested_maps() {
        let mut inner = ParamMap::new();
        inner.insert("node".into(), ParamValue::from("h1"));
        let mut params = ParamMap::new();
        params.insert("address".into(), ParamValue::Map(inner));
        let req = Request::new("discovery::NewComponent", params);
        let address = req.get("address").and_then(ParamValue::as_map).unwrap();
        assert_eq!(address.get("node").and_then(ParamValue::as_str), Some("h1"));
    }

    #[cfg(feature = "std_json")]
    #[test]
    fn json_round_trip_preserves_shape() {
        let mut params = ParamMap::new();
        params.insert("count".into(), ParamValue::Int(3));
        params.insert("ok".into(), ParamValue::Bool(true));
        let value = serde_json::Value::from(&ParamValue::Map(params.clone()));
        let back = ParamValue::from(&value);
        assert_eq!(back, ParamValue::Map(params));
    }
}
