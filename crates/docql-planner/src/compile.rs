//! Flat filter compilation and the compiled-output envelope.

use docql_core::document::{Document, FindRequest, Pipeline};
use docql_core::hash::{fingerprint_request, Fingerprint};
use docql_core::manifest::RequestKind;
use docql_core::naming::FieldTarget;
use docql_operators::{Fragment, Registry};
use serde_json::{Map, Value as Json};

use crate::constraint::{Clause, Combinator};
use crate::error::{PlanError, Result};

/// What a query compiles to.
#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    /// Flat filter for the REST find endpoint.
    Find(FindRequest),
    /// Aggregation pipeline against raw storage.
    Aggregate { table: String, pipeline: Pipeline },
}

impl Compiled {
    pub fn table(&self) -> &str {
        match self {
            Compiled::Find(req) => &req.table,
            Compiled::Aggregate { table, .. } => table,
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Compiled::Find(_) => RequestKind::Find,
            Compiled::Aggregate { .. } => RequestKind::Aggregate,
        }
    }

    pub fn is_pipeline(&self) -> bool {
        matches!(self, Compiled::Aggregate { .. })
    }

    pub fn pipeline(&self) -> Option<&Pipeline> {
        match self {
            Compiled::Aggregate { pipeline, .. } => Some(pipeline),
            Compiled::Find(_) => None,
        }
    }

    pub fn find_request(&self) -> Option<&FindRequest> {
        match self {
            Compiled::Find(req) => Some(req),
            Compiled::Aggregate { .. } => None,
        }
    }

    pub fn stage_count(&self) -> usize {
        self.pipeline().map(Pipeline::len).unwrap_or(0)
    }

    /// Wire body: the find request object or the stage array.
    pub fn to_json(&self) -> Result<Json> {
        Ok(match self {
            Compiled::Find(req) => serde_json::to_value(req)
                .map_err(|e| PlanError::Core(docql_core::error::Error::from(e)))?,
            Compiled::Aggregate { pipeline, .. } => pipeline.to_json(),
        })
    }

    pub fn fingerprint(&self) -> Result<Fingerprint> {
        let body = self.to_json()?;
        Ok(fingerprint_request(self.table(), &body)?)
    }
}

/// Compile direct-only clauses into one filter document.
///
/// Callers must have routed pipeline-only clauses elsewhere; meeting one
/// here is an `Unsupported` error.
pub fn compile_filter(
    clauses: &[Clause],
    registry: &Registry,
    target: FieldTarget,
) -> Result<Document> {
    let mut doc = Map::new();
    for clause in clauses {
        compile_into(&mut doc, clause, registry, target)?;
    }
    Ok(doc)
}

fn compile_into(
    doc: &mut Document,
    clause: &Clause,
    registry: &Registry,
    target: FieldTarget,
) -> Result<()> {
    match clause {
        Clause::Single(constraint) => match constraint.compile(registry, target)? {
            Fragment::Filter { key, condition } => {
                merge_condition(doc, key, condition);
                Ok(())
            }
            Fragment::Stages(_) => Err(PlanError::Unsupported(format!(
                "{} on '{}' needs an aggregation pipeline and cannot appear in a flat filter",
                constraint.operator(),
                constraint.operand()
            ))),
        },
        Clause::Compound(compound) if compound.is_empty() => Ok(()),
        Clause::Compound(compound) => match compound.combinator() {
            Combinator::And => {
                for inner in compound.clauses() {
                    compile_into(doc, inner, registry, target)?;
                }
                Ok(())
            }
            Combinator::Or => {
                let mut branches = Vec::with_capacity(compound.clauses().len());
                for inner in compound.clauses() {
                    let mut branch = Map::new();
                    compile_into(&mut branch, inner, registry, target)?;
                    if !branch.is_empty() {
                        branches.push(Json::Object(branch));
                    }
                }
                match branches.len() {
                    0 => {}
                    1 => {
                        if let Some(Json::Object(only)) = branches.pop() {
                            for (k, v) in only {
                                merge_condition(doc, k, v);
                            }
                        }
                    }
                    _ => merge_condition(doc, "$or".to_string(), Json::Array(branches)),
                }
                Ok(())
            }
        },
    }
}

/// Put `key: condition` into `doc`. Two operator maps on the same field
/// merge when their operators don't collide; anything else is pushed into
/// `$and` so no condition is ever dropped.
fn merge_condition(doc: &mut Document, key: String, condition: Json) {
    if !doc.contains_key(&key) {
        doc.insert(key, condition);
        return;
    }
    let mergeable = match (doc.get(&key), &condition) {
        (Some(Json::Object(existing)), Json::Object(incoming)) => {
            is_operator_map(existing)
                && is_operator_map(incoming)
                && incoming.keys().all(|k| !existing.contains_key(k))
        }
        _ => false,
    };

    if mergeable {
        if let (Some(Json::Object(existing)), Json::Object(incoming)) =
            (doc.get_mut(&key), condition)
        {
            existing.extend(incoming);
        }
        return;
    }

    let mut entry = Map::with_capacity(1);
    entry.insert(key, condition);
    match doc
        .entry("$and".to_string())
        .or_insert_with(|| Json::Array(Vec::new()))
    {
        Json::Array(items) => items.push(Json::Object(entry)),
        other => {
            let prior = other.take();
            *other = Json::Array(vec![prior, Json::Object(entry)]);
        }
    }
}

fn is_operator_map(map: &Map<String, Json>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}
