//! Strategy trait + common error type.
//!
//! The planner calls `validate(...)` when a constraint is constructed and
//! `compile(...)` when the owning query is compiled. Both must be pure.

use docql_core::naming::FieldTarget;
use docql_core::value::Value;

use thiserror::Error;

use crate::fragment::{Fragment, StrategyKind};
use crate::registry::OperatorTag;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpError {
    /// Wrong value shape/arity for the operator.
    #[error("ArgumentError: {0}")]
    Argument(String),

    /// Tag not present in the registry.
    #[error("InvalidOperatorError: Unknown operator '{0}'")]
    InvalidOperator(String),

    /// Operator has no encoding for the requested target.
    #[error("{0}")]
    Unsupported(String),
}

impl OpError {
    pub fn argument(tag: OperatorTag, msg: impl std::fmt::Display) -> Self {
        OpError::Argument(format!("{} {}", tag, msg))
    }

    pub fn rest_only(tag: OperatorTag) -> Self {
        OpError::Unsupported(format!(
            "{} runs a subquery through the find endpoint and has no aggregation pipeline form",
            tag
        ))
    }
}

/// Trait that all operators must implement.
///
/// Invariants:
/// - `compile` is only called with values that passed `validate`.
/// - Output must be deterministic given the same operand/value/target.
pub trait OperatorStrategy: Send + Sync + 'static {
    /// Stable tag this strategy is registered under.
    fn tag(&self) -> OperatorTag;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    /// Arity/type checks, run at constraint construction.
    fn validate(&self, value: &Value) -> Result<(), OpError>;

    /// Compile `operand <op> value` for `target`.
    ///
    /// Pipeline-only strategies ignore `target`; their stages always address storage.
    fn compile(&self, operand: &str, value: &Value, target: FieldTarget)
        -> Result<Fragment, OpError>;
}
