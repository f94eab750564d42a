//! Minimal YAML -> `Query` parser.
//!
//! Example:
//! ```yaml
//! table: Post
//! where:
//!   - { field: likes, op: gt, value: 10 }
//!   - or:
//!       - [ { field: status, op: eq, value: draft } ]
//!       - [ { field: status, op: eq, value: review } ]
//!   - { field: author, op: equals_linked_pointer,
//!       value: { through: project, field: owner } }
//!   - { field: topic, op: in_query,
//!       value: { table: Topic, where: [ { field: archived, op: eq, value: false } ] } }
//! order: [ "-created_at" ]
//! limit: 20
//! config: { max_pipeline_stages: 30 }
//! ```
//!
//! Values use the REST envelopes (`{__type: Pointer, className, objectId}`).
//! For `select`/`reject` the value is `{ key, query: <nested query> }`; for
//! `in_query`/`not_in_query` the value is the nested query itself.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use docql_core::config::CompilerConfig;
use docql_core::value::Value;
use docql_operators::OperatorTag;

use crate::constraint::{Clause, CompoundConstraint, Constraint};
use crate::error::{PlanError, Result};
use crate::query::Query;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default)]
    pub config: Option<QueryConfig>,
    pub table: String,
    #[serde(default, rename = "where")]
    pub clauses: Vec<ClauseSpec>,
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub skip: Option<u64>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub cache: Option<bool>,
    #[serde(default)]
    pub master_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClauseSpec {
    Constraint {
        field: String,
        op: String,
        #[serde(default)]
        value: Json,
    },
    /// Each element is one AND group; the groups are OR-ed.
    Or { or: Vec<Vec<ClauseSpec>> },
    And { and: Vec<ClauseSpec> },
}

/// Per-file overrides for the compiler configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_pipeline_stages: Option<usize>,
    pub max_depth: Option<usize>,
    pub rate_limit: Option<u32>,
    pub rate_window_secs: Option<u64>,
    pub cache_by_default: Option<bool>,
}

impl QueryConfig {
    /// Overlay the values this file sets onto `cfg`.
    pub fn apply_to(&self, cfg: &mut CompilerConfig) {
        if let Some(v) = self.max_pipeline_stages {
            cfg.max_pipeline_stages = v;
        }
        if let Some(v) = self.max_depth {
            cfg.max_depth = v;
        }
        if let Some(v) = self.rate_limit {
            cfg.rate_limit = v;
        }
        if let Some(v) = self.rate_window_secs {
            cfg.rate_window_secs = v;
        }
        if let Some(v) = self.cache_by_default {
            cfg.cache_by_default = v;
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub query: Query,
    pub config: QueryConfig,
}

/// Parse a YAML (or JSON) query description into a `Query`.
pub fn parse_yaml_query(yaml_src: &str) -> Result<ParsedQuery> {
    let spec: QuerySpec = serde_yaml::from_str(yaml_src)?;
    let config = spec.config.clone().unwrap_or_default();
    Ok(ParsedQuery {
        query: build_query(&spec)?,
        config,
    })
}

fn build_query(spec: &QuerySpec) -> Result<Query> {
    if spec.table.trim().is_empty() {
        return Err(PlanError::Dsl("'table' must not be empty".into()));
    }
    let mut query = Query::new(spec.table.clone());
    for clause in &spec.clauses {
        query.where_(build_clause(clause)?);
    }
    query
        .order_by_keys(&spec.order)
        .keys(spec.keys.iter().cloned())
        .include(spec.include.iter().cloned())
        .use_cache(spec.cache)
        .use_master_key(spec.master_key);
    if let Some(limit) = spec.limit {
        query.limit(limit);
    }
    if let Some(skip) = spec.skip {
        query.skip(skip);
    }
    Ok(query)
}

fn build_clause(spec: &ClauseSpec) -> Result<Clause> {
    match spec {
        ClauseSpec::Constraint { field, op, value } => {
            let tag: OperatorTag = op.parse()?;
            let value = build_value(tag, value)?;
            Ok(Constraint::new(field.clone(), tag, value)?.into())
        }
        ClauseSpec::Or { or } => {
            let mut groups = Vec::with_capacity(or.len());
            for group in or {
                let inner = group.iter().map(build_clause).collect::<Result<Vec<_>>>()?;
                groups.push(Clause::from(CompoundConstraint::and(inner)));
            }
            Ok(CompoundConstraint::or(groups).into())
        }
        ClauseSpec::And { and } => {
            let inner = and.iter().map(build_clause).collect::<Result<Vec<_>>>()?;
            Ok(CompoundConstraint::and(inner).into())
        }
    }
}

fn build_value(tag: OperatorTag, raw: &Json) -> Result<Value> {
    match tag {
        OperatorTag::InQuery | OperatorTag::NotInQuery => Ok(nested_subquery(tag, raw)?),
        OperatorTag::Select | OperatorTag::Reject => {
            let key = raw
                .get("key")
                .and_then(Json::as_str)
                .ok_or_else(|| PlanError::Dsl(format!("{} requires a 'key'", tag)))?;
            let query = raw
                .get("query")
                .ok_or_else(|| PlanError::Dsl(format!("{} requires a 'query'", tag)))?;
            Ok(docql_core::value::object([
                ("key", Value::from(key)),
                ("query", nested_subquery(tag, query)?),
            ]))
        }
        _ => Ok(Value::from_json(raw)),
    }
}

fn nested_subquery(tag: OperatorTag, raw: &Json) -> Result<Value> {
    let spec: QuerySpec = serde_json::from_value(raw.clone())
        .map_err(|e| PlanError::Dsl(format!("{} nested query: {}", tag, e)))?;
    Ok(Value::Subquery(build_query(&spec)?.to_subquery()?))
}
