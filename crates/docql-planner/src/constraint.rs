//! Constraints: one field/operator/value triple, plus OR/AND compounds.
//!
//! A `Constraint` is validated against its operator's strategy when it is
//! built and is immutable afterwards, so compile time never sees malformed
//! arity.

use docql_core::naming::FieldTarget;
use docql_core::value::{object, Value};
use docql_operators::{Fragment, OperatorTag, Registry, StrategyKind};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    operand: String,
    operator: OperatorTag,
    value: Value,
}

impl Constraint {
    /// Build against the standard registry.
    pub fn new(
        operand: impl Into<String>,
        operator: OperatorTag,
        value: impl Into<Value>,
    ) -> Result<Self> {
        Self::with_registry(docql_operators::standard_registry(), operand, operator, value)
    }

    pub fn with_registry(
        registry: &Registry,
        operand: impl Into<String>,
        operator: OperatorTag,
        value: impl Into<Value>,
    ) -> Result<Self> {
        let operand = operand.into();
        if operand.trim().is_empty() {
            return Err(PlanError::Argument(format!(
                "{} constraint requires a field name",
                operator
            )));
        }
        let value = value.into();
        registry.get(operator)?.validate(&value)?;
        Ok(Self {
            operand,
            operator,
            value,
        })
    }

    /// Build from a string tag (`"gt"`, `"like"`, ...). Unknown tags are an error.
    pub fn parse(operand: impl Into<String>, tag: &str, value: impl Into<Value>) -> Result<Self> {
        let operator: OperatorTag = tag.parse()?;
        Self::new(operand, operator, value)
    }

    pub fn eq(operand: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        Self::new(operand, OperatorTag::Eq, value)
    }

    pub fn between(
        operand: impl Into<String>,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> Result<Self> {
        Self::new(operand, OperatorTag::Between, Value::Array(vec![lo.into(), hi.into()]))
    }

    /// `operand` equals `field` on the record behind pointer `through`.
    pub fn equals_linked_pointer(
        operand: impl Into<String>,
        through: &str,
        field: &str,
    ) -> Result<Self> {
        Self::new(
            operand,
            OperatorTag::EqualsLinkedPointer,
            object([("through", through), ("field", field)]),
        )
    }

    pub fn does_not_equal_linked_pointer(
        operand: impl Into<String>,
        through: &str,
        field: &str,
    ) -> Result<Self> {
        Self::new(
            operand,
            OperatorTag::DoesNotEqualLinkedPointer,
            object([("through", through), ("field", field)]),
        )
    }

    pub fn operand(&self) -> &str {
        &self.operand
    }

    pub fn operator(&self) -> OperatorTag {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind(&self, registry: &Registry) -> Result<StrategyKind> {
        Ok(registry.kind_of(self.operator)?)
    }

    pub fn compile(&self, registry: &Registry, target: FieldTarget) -> Result<Fragment> {
        Ok(registry
            .get(self.operator)?
            .compile(&self.operand, &self.value, target)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    Or,
    And,
}

impl Combinator {
    pub fn key(self) -> &'static str {
        match self {
            Combinator::Or => "$or",
            Combinator::And => "$and",
        }
    }
}

/// Ordered clauses under one logical combinator.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundConstraint {
    combinator: Combinator,
    clauses: Vec<Clause>,
}

impl CompoundConstraint {
    pub fn new(combinator: Combinator, clauses: Vec<Clause>) -> Self {
        Self {
            combinator,
            clauses,
        }
    }

    pub fn or(clauses: impl IntoIterator<Item = impl Into<Clause>>) -> Self {
        Self::new(Combinator::Or, clauses.into_iter().map(Into::into).collect())
    }

    pub fn and(clauses: impl IntoIterator<Item = impl Into<Clause>>) -> Self {
        Self::new(Combinator::And, clauses.into_iter().map(Into::into).collect())
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// One entry of a query's `where` list.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Single(Constraint),
    Compound(CompoundConstraint),
}

impl Clause {
    /// True if this clause, or anything nested in it, needs the pipeline.
    pub fn requires_pipeline(&self, registry: &Registry) -> Result<bool> {
        match self {
            Clause::Single(c) => Ok(c.kind(registry)? == StrategyKind::PipelineOnly),
            Clause::Compound(compound) => {
                for clause in compound.clauses() {
                    if clause.requires_pipeline(registry)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Depth-first walk over every leaf constraint.
    pub fn constraints(&self) -> Vec<&Constraint> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Constraint>) {
        match self {
            Clause::Single(c) => out.push(c),
            Clause::Compound(compound) => {
                for clause in compound.clauses() {
                    clause.collect(out);
                }
            }
        }
    }
}

impl From<Constraint> for Clause {
    fn from(c: Constraint) -> Self {
        Clause::Single(c)
    }
}

impl From<CompoundConstraint> for Clause {
    fn from(c: CompoundConstraint) -> Self {
        Clause::Compound(c)
    }
}
