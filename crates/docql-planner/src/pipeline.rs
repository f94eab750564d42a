//! Lowering a query to an aggregation pipeline.
//!
//! Stage layout is fixed:
//! 1. one `$match` holding every flat constraint (storage field names),
//! 2. each pipeline-only constraint's stages, in attachment order,
//! 3. `$sort`, then `$project`,
//! 4. `$limit`, then `$skip`.

use docql_core::document::{Pipeline, Stage, StageKind};
use docql_core::naming::{self, FieldTarget};
use docql_operators::{Fragment, Registry, StrategyKind};
use serde_json::{Map, Value as Json};

use crate::compile::compile_filter;
use crate::constraint::{Clause, Combinator, Constraint};
use crate::error::{PlanError, Result};
use crate::query::Query;

pub struct PipelineBuilder<'r> {
    registry: &'r Registry,
}

impl<'r> PipelineBuilder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn build(&self, query: &Query) -> Result<Pipeline> {
        let mut flat: Vec<Clause> = Vec::new();
        let mut staged: Vec<&Constraint> = Vec::new();
        for clause in query.clauses() {
            self.partition(clause, &mut flat, &mut staged)?;
        }

        let mut pipeline = Pipeline::new();

        let filter = compile_filter(&flat, self.registry, FieldTarget::Storage)?;
        if !filter.is_empty() {
            pipeline.push(Stage::new(StageKind::Match, Json::Object(filter)));
        }

        for constraint in staged {
            match constraint.compile(self.registry, FieldTarget::Storage)? {
                Fragment::Stages(stages) => pipeline.extend(stages),
                // A strategy that reports PipelineOnly but returns a filter
                // still lands in the pipeline, as its own match.
                Fragment::Filter { key, condition } => {
                    let mut doc = Map::with_capacity(1);
                    doc.insert(key, condition);
                    pipeline.push(Stage::new(StageKind::Match, Json::Object(doc)));
                }
            }
        }

        if !query.ordering().is_empty() {
            let mut sort = Map::new();
            for (field, dir) in query.ordering() {
                sort.insert(naming::storage_field(field), Json::from(dir.sign()));
            }
            pipeline.push(Stage::new(StageKind::Sort, Json::Object(sort)));
        }

        if !query.key_fields().is_empty() {
            let mut project = Map::new();
            for key in query.key_fields() {
                project.insert(naming::storage_field(key), Json::from(1));
            }
            pipeline.push(Stage::new(StageKind::Project, Json::Object(project)));
        }

        if let Some(limit) = query.limit_value() {
            pipeline.push(Stage::new(StageKind::Limit, Json::from(limit)));
        }
        if let Some(skip) = query.skip_value() {
            pipeline.push(Stage::new(StageKind::Skip, Json::from(skip)));
        }

        Ok(pipeline)
    }

    /// Route `clause` to the leading match or to the staged list.
    ///
    /// AND groups are split apart; an OR group that contains a pipeline-only
    /// operator has no stage-sequence equivalent and is rejected.
    fn partition<'q>(
        &self,
        clause: &'q Clause,
        flat: &mut Vec<Clause>,
        staged: &mut Vec<&'q Constraint>,
    ) -> Result<()> {
        if !clause.requires_pipeline(self.registry)? {
            flat.push(clause.clone());
            return Ok(());
        }
        match clause {
            Clause::Single(c) => {
                debug_assert_eq!(c.kind(self.registry)?, StrategyKind::PipelineOnly);
                staged.push(c);
                Ok(())
            }
            Clause::Compound(compound) => match compound.combinator() {
                Combinator::And => {
                    for inner in compound.clauses() {
                        self.partition(inner, flat, staged)?;
                    }
                    Ok(())
                }
                Combinator::Or => Err(PlanError::Unsupported(
                    "pipeline-only operators cannot be combined under $or".into(),
                )),
            },
        }
    }
}
