//! Query builder.
//!
//! A `Query` accumulates clauses, ordering, projection, and pagination, then
//! compiles to either a flat find request or an aggregation pipeline. The
//! bound transport client and cached results are transient: `clone()` never
//! carries them over, so a clone always starts unexecuted.

use std::fmt;
use std::sync::Arc;

use docql_core::document::{FindRequest, Transport};
use docql_core::naming::{self, FieldTarget};
use docql_core::value::Subquery;
use docql_operators::Registry;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::acl::AclFilter;
use crate::compile::{compile_filter, Compiled};
use crate::constraint::{Clause, CompoundConstraint, Constraint};
use crate::error::{PlanError, Result};
use crate::pipeline::PipelineBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// `-created_at` -> (`created_at`, Desc).
    pub fn parse_key(key: &str) -> (&str, Direction) {
        match key.strip_prefix('-') {
            Some(field) => (field, Direction::Desc),
            None => (key.strip_prefix('+').unwrap_or(key), Direction::Asc),
        }
    }

    pub fn sign(self) -> i64 {
        match self {
            Direction::Asc => 1,
            Direction::Desc => -1,
        }
    }
}

/// Results from one execution, tagged with the master-key mode they were
/// fetched under.
struct CachedResults {
    records: Vec<Json>,
    master_key: bool,
}

/// Execution state that must never be duplicated.
#[derive(Default)]
struct Transient {
    client: Option<Arc<dyn Transport>>,
    results: Option<CachedResults>,
}

impl fmt::Debug for Transient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transient")
            .field("client", &self.client.as_ref().map(|_| "<transport>"))
            .field("results", &self.results.as_ref().map(|r| r.records.len()))
            .field("master_key", &self.results.as_ref().map(|r| r.master_key))
            .finish()
    }
}

#[derive(Debug)]
pub struct Query {
    table: String,
    clauses: Vec<Clause>,
    order: Vec<(String, Direction)>,
    limit: Option<u64>,
    skip: Option<u64>,
    keys: Vec<String>,
    includes: Vec<String>,
    use_cache: Option<bool>,
    use_master_key: bool,
    transient: Transient,
}

impl Clone for Query {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            clauses: self.clauses.clone(),
            order: self.order.clone(),
            limit: self.limit,
            skip: self.skip,
            keys: self.keys.clone(),
            includes: self.includes.clone(),
            use_cache: self.use_cache,
            use_master_key: self.use_master_key,
            transient: Transient::default(),
        }
    }
}

impl PartialEq for Query {
    /// Declarative equality; transient state is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
            && self.clauses == other.clauses
            && self.order == other.order
            && self.limit == other.limit
            && self.skip == other.skip
            && self.keys == other.keys
            && self.includes == other.includes
            && self.use_cache == other.use_cache
            && self.use_master_key == other.use_master_key
    }
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            clauses: Vec::new(),
            order: Vec::new(),
            limit: None,
            skip: None,
            keys: Vec::new(),
            includes: Vec::new(),
            use_cache: None,
            use_master_key: false,
            transient: Transient::default(),
        }
    }

    // ----- accumulation -----

    /// Attach one clause (AND semantics with everything already attached).
    pub fn where_(&mut self, clause: impl Into<Clause>) -> &mut Self {
        self.clauses.push(clause.into());
        self.invalidate();
        self
    }

    pub fn where_all(&mut self, clauses: impl IntoIterator<Item = impl Into<Clause>>) -> &mut Self {
        self.clauses.extend(clauses.into_iter().map(Into::into));
        self.invalidate();
        self
    }

    /// OR the existing clauses (as one group) with `clauses` (as another).
    /// An empty `clauses` is a no-op.
    pub fn or_where(&mut self, clauses: impl IntoIterator<Item = impl Into<Clause>>) -> &mut Self {
        let incoming: Vec<Clause> = clauses.into_iter().map(Into::into).collect();
        if incoming.is_empty() {
            return self;
        }
        if self.clauses.is_empty() {
            self.clauses = incoming;
        } else {
            let existing = std::mem::take(&mut self.clauses);
            self.clauses = vec![CompoundConstraint::or([
                group(existing),
                group(incoming),
            ])
            .into()];
        }
        self.invalidate();
        self
    }

    /// Restrict to records `filter`'s caller may read.
    pub fn readable_by(&mut self, filter: &AclFilter) -> Result<&mut Self> {
        let clause = filter.read_clause()?;
        Ok(self.where_(clause))
    }

    /// Restrict to records `filter`'s caller may write.
    pub fn writable_by(&mut self, filter: &AclFilter) -> Result<&mut Self> {
        let clause = filter.write_clause()?;
        Ok(self.where_(clause))
    }

    pub fn order(&mut self, field: impl Into<String>, direction: Direction) -> &mut Self {
        self.order.push((field.into(), direction));
        self.invalidate();
        self
    }

    /// `"-created_at"` style ordering keys.
    pub fn order_by_keys<S: AsRef<str>>(&mut self, keys: impl IntoIterator<Item = S>) -> &mut Self {
        for key in keys {
            let (field, dir) = Direction::parse_key(key.as_ref());
            self.order.push((field.to_string(), dir));
        }
        self.invalidate();
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self.invalidate();
        self
    }

    pub fn skip(&mut self, skip: u64) -> &mut Self {
        self.skip = Some(skip);
        self.invalidate();
        self
    }

    pub fn keys<S: Into<String>>(&mut self, keys: impl IntoIterator<Item = S>) -> &mut Self {
        self.keys.extend(keys.into_iter().map(Into::into));
        self.invalidate();
        self
    }

    pub fn include<S: Into<String>>(&mut self, fields: impl IntoIterator<Item = S>) -> &mut Self {
        self.includes.extend(fields.into_iter().map(Into::into));
        self.invalidate();
        self
    }

    /// `None` defers to the executor's configured default.
    pub fn use_cache(&mut self, cache: Option<bool>) -> &mut Self {
        self.use_cache = cache;
        self
    }

    /// Cached results from the other mode are dropped.
    pub fn use_master_key(&mut self, master: bool) -> &mut Self {
        self.use_master_key = master;
        self.invalidate();
        self
    }

    // ----- combination -----

    /// OR several queries on the same table. Queries without clauses
    /// contribute nothing.
    pub fn or(queries: &[Query]) -> Result<Query> {
        let table = common_table(queries)?;
        let groups: Vec<Clause> = queries
            .iter()
            .filter(|q| !q.clauses.is_empty())
            .map(|q| group(q.clauses.clone()))
            .collect();
        let mut out = Query::new(table);
        match groups.len() {
            0 => {}
            1 => {
                if let Some(Clause::Compound(only)) = groups.into_iter().next() {
                    out.clauses = only.clauses().to_vec();
                }
            }
            _ => out.clauses = vec![CompoundConstraint::or(groups).into()],
        }
        Ok(out)
    }

    /// AND several queries on the same table by concatenating their clauses.
    pub fn and(queries: &[Query]) -> Result<Query> {
        let table = common_table(queries)?;
        let mut out = Query::new(table);
        for q in queries {
            out.clauses.extend(q.clauses.iter().cloned());
        }
        Ok(out)
    }

    // ----- accessors -----

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Every leaf constraint, depth-first.
    pub fn constraints(&self) -> Vec<&Constraint> {
        self.clauses.iter().flat_map(Clause::constraints).collect()
    }

    pub fn ordering(&self) -> &[(String, Direction)] {
        &self.order
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn skip_value(&self) -> Option<u64> {
        self.skip
    }

    pub fn key_fields(&self) -> &[String] {
        &self.keys
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn cache_preference(&self) -> Option<bool> {
        self.use_cache
    }

    pub fn master_key(&self) -> bool {
        self.use_master_key
    }

    // ----- compilation -----

    pub fn requires_pipeline(&self) -> Result<bool> {
        self.requires_pipeline_with(docql_operators::standard_registry())
    }

    pub fn requires_pipeline_with(&self, registry: &Registry) -> Result<bool> {
        for clause in &self.clauses {
            if clause.requires_pipeline(registry)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn compile(&self) -> Result<Compiled> {
        self.compile_with(docql_operators::standard_registry())
    }

    pub fn compile_with(&self, registry: &Registry) -> Result<Compiled> {
        if self.requires_pipeline_with(registry)? {
            let pipeline = PipelineBuilder::new(registry).build(self)?;
            Ok(Compiled::Aggregate {
                table: self.table.clone(),
                pipeline,
            })
        } else {
            Ok(Compiled::Find(self.find_request(registry)?))
        }
    }

    fn find_request(&self, registry: &Registry) -> Result<FindRequest> {
        Ok(FindRequest {
            table: self.table.clone(),
            filter: compile_filter(&self.clauses, registry, FieldTarget::Rest)?,
            order: join_nonempty(self.order.iter().map(|(field, dir)| {
                let name = naming::rest_field(field);
                match dir {
                    Direction::Asc => name,
                    Direction::Desc => format!("-{}", name),
                }
            })),
            limit: self.limit,
            skip: self.skip,
            keys: join_nonempty(self.keys.iter().map(|k| naming::rest_field(k))),
            include: join_nonempty(self.includes.iter().map(|k| naming::rest_field(k))),
        })
    }

    /// This query as the nested value of `select`/`reject`/`in_query`.
    pub fn to_subquery(&self) -> Result<Subquery> {
        let registry = docql_operators::standard_registry();
        if self.requires_pipeline_with(registry)? {
            return Err(PlanError::Unsupported(format!(
                "subquery on '{}' uses pipeline-only operators",
                self.table
            )));
        }
        Ok(Subquery {
            class_name: self.table.clone(),
            filter: compile_filter(&self.clauses, registry, FieldTarget::Rest)?,
        })
    }

    // ----- transient state -----

    pub fn bind(&mut self, client: Arc<dyn Transport>) -> &mut Self {
        self.transient.client = Some(client);
        self
    }

    pub fn client(&self) -> Option<&Arc<dyn Transport>> {
        self.transient.client.as_ref()
    }

    pub fn cached_results(&self) -> Option<&[Json]> {
        self.transient.results.as_ref().map(|r| r.records.as_slice())
    }

    /// Cached results, but only when they were fetched in the same
    /// master-key mode. Master-key reads bypass ACLs and must never be
    /// served to a call that runs without it.
    pub fn cached_results_for(&self, master_key: bool) -> Option<&[Json]> {
        self.transient
            .results
            .as_ref()
            .filter(|r| r.master_key == master_key)
            .map(|r| r.records.as_slice())
    }

    /// Store results fetched under the query's own master-key setting.
    pub fn store_results(&mut self, results: Vec<Json>) {
        let master_key = self.use_master_key;
        self.store_results_with(results, master_key);
    }

    pub fn store_results_with(&mut self, results: Vec<Json>, master_key: bool) {
        self.transient.results = Some(CachedResults {
            records: results,
            master_key,
        });
    }

    pub fn clear_cache(&mut self) {
        self.transient.results = None;
    }

    pub fn is_executed(&self) -> bool {
        self.transient.results.is_some()
    }

    fn invalidate(&mut self) {
        self.transient.results = None;
    }
}

fn group(clauses: Vec<Clause>) -> Clause {
    CompoundConstraint::new(crate::constraint::Combinator::And, clauses).into()
}

fn common_table(queries: &[Query]) -> Result<String> {
    let first = queries
        .first()
        .ok_or_else(|| PlanError::Argument("at least one query is required".into()))?;
    for q in &queries[1..] {
        if q.table != first.table {
            return Err(PlanError::TableMismatch {
                left: first.table.clone(),
                right: q.table.clone(),
            });
        }
    }
    Ok(first.table.clone())
}

fn join_nonempty(items: impl Iterator<Item = String>) -> Option<String> {
    let joined: Vec<String> = items.collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined.join(","))
    }
}
