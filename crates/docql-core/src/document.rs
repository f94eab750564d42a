//! Compiled outputs and the transport seam.
//!
//! The compiler produces either a `FindRequest` (flat filter for the REST
//! endpoint) or a `Pipeline` (ordered aggregation stages). A `Transport`
//! consumes either and returns raw result records; transports live outside
//! this workspace apart from test doubles.

use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value as Json};

use crate::error::{Error, Result};

/// Filter/payload document.
pub type Document = Map<String, Json>;

/// Stage vocabulary the pipeline builder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Match,
    Lookup,
    AddFields,
    Group,
    Sort,
    Limit,
    Skip,
    Count,
    Facet,
    Unwind,
    Project,
}

impl StageKind {
    /// Operator key used on the wire (`$match`, `$lookup`, ...).
    pub fn key(self) -> &'static str {
        match self {
            StageKind::Match => "$match",
            StageKind::Lookup => "$lookup",
            StageKind::AddFields => "$addFields",
            StageKind::Group => "$group",
            StageKind::Sort => "$sort",
            StageKind::Limit => "$limit",
            StageKind::Skip => "$skip",
            StageKind::Count => "$count",
            StageKind::Facet => "$facet",
            StageKind::Unwind => "$unwind",
            StageKind::Project => "$project",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "$match" => StageKind::Match,
            "$lookup" => StageKind::Lookup,
            "$addFields" => StageKind::AddFields,
            "$group" => StageKind::Group,
            "$sort" => StageKind::Sort,
            "$limit" => StageKind::Limit,
            "$skip" => StageKind::Skip,
            "$count" => StageKind::Count,
            "$facet" => StageKind::Facet,
            "$unwind" => StageKind::Unwind,
            "$project" => StageKind::Project,
            _ => return None,
        })
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key().trim_start_matches('$'))
    }
}

/// One aggregation step: `{ "$<name>": payload }` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub kind: StageKind,
    pub payload: Json,
}

impl Stage {
    pub fn new(kind: StageKind, payload: Json) -> Self {
        Self { kind, payload }
    }

    pub fn to_json(&self) -> Json {
        let mut doc = Map::with_capacity(1);
        doc.insert(self.kind.key().to_string(), self.payload.clone());
        Json::Object(doc)
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.kind.key(), &self.payload)?;
        map.end()
    }
}

/// Ordered list of stages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn extend(&mut self, stages: impl IntoIterator<Item = Stage>) {
        self.stages.extend(stages);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in order, handy for assertions and logs.
    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind).collect()
    }

    pub fn to_json(&self) -> Json {
        Json::Array(self.stages.iter().map(Stage::to_json).collect())
    }

    /// Parse a raw stage array. Only shape is checked here; policy checks
    /// belong to the sandbox and must run first on untrusted input.
    pub fn from_json(raw: &Json) -> Result<Self> {
        let items = raw
            .as_array()
            .ok_or_else(|| Error::Argument("pipeline must be an array of stages".into()))?;
        let mut stages = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let (key, payload) = match item.as_object() {
                Some(map) if map.len() == 1 => map
                    .iter()
                    .next()
                    .ok_or_else(|| Error::Invariant("single-key map had no entry".into()))?,
                _ => {
                    return Err(Error::Argument(format!(
                        "stage {} must be an object with exactly one key",
                        i
                    )))
                }
            };
            let kind = StageKind::from_key(key)
                .ok_or_else(|| Error::Argument(format!("unsupported stage '{}'", key)))?;
            stages.push(Stage::new(kind, payload.clone()));
        }
        Ok(Self { stages })
    }
}

impl Serialize for Pipeline {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.stages.len()))?;
        for stage in &self.stages {
            seq.serialize_element(stage)?;
        }
        seq.end()
    }
}

impl From<Vec<Stage>> for Pipeline {
    fn from(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

/// Flat REST query: `GET /classes/<table>?where=...&order=...`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindRequest {
    #[serde(skip)]
    pub table: String,
    #[serde(rename = "where")]
    pub filter: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
}

/// Execution collaborator. Receives compiled output, returns raw records.
pub trait Transport: Send + Sync {
    fn find(&self, request: &FindRequest, use_master_key: bool) -> Result<Vec<Json>>;

    fn aggregate(&self, table: &str, pipeline: &Pipeline, use_master_key: bool)
        -> Result<Vec<Json>>;
}
