//! Constraint values.
//!
//! A `Value` is what sits on the right-hand side of a constraint. Most values
//! are plain JSON scalars/containers; pointers, geo points, dates, and
//! compiled subqueries get their own variants because their encoding depends
//! on the compile target (REST endpoint vs. raw storage).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};

use crate::naming::FieldTarget;

/// Reference to another record: collection name + id. Lookup-only, never owning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pointer {
    pub class_name: String,
    pub object_id: String,
}

impl Pointer {
    pub fn new(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            object_id: object_id.into(),
        }
    }

    /// Storage encoding used in `_p_` columns: `Class$id`.
    pub fn storage_key(&self) -> String {
        format!("{}${}", self.class_name, self.object_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Accepts `[lat, lng]` or a geo point value.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::GeoPoint(p) => Some(*p),
            Value::Array(items) if items.len() == 2 => {
                Some(Self::new(items[0].as_f64()?, items[1].as_f64()?))
            }
            _ => None,
        }
    }

    fn to_json(self, target: FieldTarget) -> Json {
        match target {
            FieldTarget::Rest => json!({
                "__type": "GeoPoint",
                "latitude": self.latitude,
                "longitude": self.longitude,
            }),
            // Storage keeps GeoJSON ordering.
            FieldTarget::Storage => json!([self.longitude, self.latitude]),
        }
    }
}

/// A nested query already compiled to its REST filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subquery {
    pub class_name: String,
    pub filter: Map<String, Json>,
}

impl Subquery {
    pub fn to_json(&self) -> Json {
        json!({
            "className": self.class_name,
            "where": Json::Object(self.filter.clone()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// ISO-8601 timestamp.
    Date(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Pointer(Pointer),
    GeoPoint(GeoPoint),
    Subquery(Subquery),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type label for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Pointer(_) => "pointer",
            Value::GeoPoint(_) => "geopoint",
            Value::Subquery(_) => "subquery",
        }
    }

    /// Encode for `target`.
    pub fn to_json(&self, target: FieldTarget) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => json!(f),
            Value::String(s) => Json::String(s.clone()),
            Value::Date(iso) => match target {
                FieldTarget::Rest => json!({ "__type": "Date", "iso": iso }),
                FieldTarget::Storage => json!({ "$date": iso }),
            },
            Value::Array(items) => Json::Array(items.iter().map(|v| v.to_json(target)).collect()),
            Value::Object(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json(target)))
                    .collect(),
            ),
            Value::Pointer(p) => match target {
                FieldTarget::Rest => json!({
                    "__type": "Pointer",
                    "className": p.class_name,
                    "objectId": p.object_id,
                }),
                FieldTarget::Storage => Json::String(p.storage_key()),
            },
            Value::GeoPoint(p) => p.to_json(target),
            Value::Subquery(q) => q.to_json(),
        }
    }

    /// Decode a JSON value, recognising the `__type` envelopes the REST
    /// endpoint uses for pointers, geo points, and dates.
    pub fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => {
                match map.get("__type").and_then(Json::as_str) {
                    Some("Pointer") => {
                        if let (Some(class), Some(id)) = (
                            map.get("className").and_then(Json::as_str),
                            map.get("objectId").and_then(Json::as_str),
                        ) {
                            return Value::Pointer(Pointer::new(class, id));
                        }
                    }
                    Some("GeoPoint") => {
                        if let (Some(lat), Some(lng)) = (
                            map.get("latitude").and_then(Json::as_f64),
                            map.get("longitude").and_then(Json::as_f64),
                        ) {
                            return Value::GeoPoint(GeoPoint::new(lat, lng));
                        }
                    }
                    Some("Date") => {
                        if let Some(iso) = map.get("iso").and_then(Json::as_str) {
                            return Value::Date(iso.to_string());
                        }
                    }
                    _ => {}
                }
                Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Value::from_json(v)))
                        .collect(),
                )
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Pointer> for Value {
    fn from(v: Pointer) -> Self {
        Value::Pointer(v)
    }
}

impl From<GeoPoint> for Value {
    fn from(v: GeoPoint) -> Self {
        Value::GeoPoint(v)
    }
}

impl From<Subquery> for Value {
    fn from(v: Subquery) -> Self {
        Value::Subquery(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<Json> for Value {
    fn from(v: Json) -> Self {
        Value::from_json(&v)
    }
}

/// Build an object value from `(key, value)` pairs.
pub fn object<K, V, I>(pairs: I) -> Value
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    Value::Object(
        pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    )
}
