//! Pipeline-only array operators: set algebra and positional access.
//!
//! None of these fit in a flat filter; each compiles to a short, fixed run of
//! stages addressing storage-level field names.

use docql_core::document::{Stage, StageKind};
use docql_core::naming::{self, FieldTarget};
use docql_core::value::Value;
use serde_json::{json, Value as Json};

use crate::comparison::as_list;
use crate::fragment::{Fragment, StrategyKind};
use crate::registry::OperatorTag;
use crate::traits::{OpError, OperatorStrategy};

fn storage_path(operand: &str, value: &Value) -> String {
    let field = crate::fragment::filter_key(operand, value, FieldTarget::Storage);
    naming::field_path(&field)
}

fn expr_match(expr: Json) -> Stage {
    Stage::new(StageKind::Match, json!({ "$expr": expr }))
}

/// `$setEquals` / `$setIsSubset` in both directions.
pub struct SetOperator {
    tag: OperatorTag,
}

impl SetOperator {
    pub fn new(tag: OperatorTag) -> Self {
        debug_assert!(matches!(
            tag,
            OperatorTag::SetEquals | OperatorTag::SubsetOf | OperatorTag::SupersetOf
        ));
        Self { tag }
    }
}

impl OperatorStrategy for SetOperator {
    fn tag(&self) -> OperatorTag {
        self.tag
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::PipelineOnly
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        match value {
            Value::Object(_) | Value::Subquery(_) | Value::Null => Err(OpError::argument(
                self.tag,
                format!("expects a list of values, got {}", value.type_name()),
            )),
            _ => Ok(()),
        }
    }

    fn compile(&self, operand: &str, value: &Value, _target: FieldTarget) -> Result<Fragment, OpError> {
        let list = as_list(value);
        let path = storage_path(operand, &list);
        let values = list.to_json(FieldTarget::Storage);
        let expr = match self.tag {
            OperatorTag::SetEquals => json!({ "$setEquals": [path, values] }),
            OperatorTag::SubsetOf => json!({ "$setIsSubset": [path, values] }),
            _ => json!({ "$setIsSubset": [values, path] }),
        };
        Ok(Fragment::Stages(vec![expr_match(expr)]))
    }
}

/// Compare the first or last array element.
pub struct ArrayPosition {
    tag: OperatorTag,
    index: i64,
}

impl ArrayPosition {
    pub fn first() -> Self {
        Self {
            tag: OperatorTag::First,
            index: 0,
        }
    }

    pub fn last() -> Self {
        Self {
            tag: OperatorTag::Last,
            index: -1,
        }
    }
}

impl OperatorStrategy for ArrayPosition {
    fn tag(&self) -> OperatorTag {
        self.tag
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::PipelineOnly
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        match value {
            Value::Array(_) | Value::Object(_) | Value::Subquery(_) => Err(OpError::argument(
                self.tag,
                format!("expects a single element value, got {}", value.type_name()),
            )),
            _ => Ok(()),
        }
    }

    fn compile(&self, operand: &str, value: &Value, _target: FieldTarget) -> Result<Fragment, OpError> {
        let path = storage_path(operand, value);
        let expr = json!({
            "$eq": [
                { "$arrayElemAt": [path, self.index] },
                value.to_json(FieldTarget::Storage),
            ]
        });
        Ok(Fragment::Stages(vec![expr_match(expr)]))
    }
}

/// Number of distinct values of `field`: `$unwind` + `$group` + `$count`.
///
/// Value is the output alias (string) or `true` for the default alias.
pub struct CountDistinct;

pub const DEFAULT_DISTINCT_ALIAS: &str = "distinct_count";

impl CountDistinct {
    fn alias(value: &Value) -> Result<&str, OpError> {
        match value {
            Value::String(s) if !s.is_empty() && !s.starts_with('$') && !s.contains('.') => Ok(s),
            Value::Bool(true) | Value::Null => Ok(DEFAULT_DISTINCT_ALIAS),
            other => Err(OpError::argument(
                OperatorTag::CountDistinct,
                format!("expects an output alias or true, got {}", other.type_name()),
            )),
        }
    }
}

impl OperatorStrategy for CountDistinct {
    fn tag(&self) -> OperatorTag {
        OperatorTag::CountDistinct
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::PipelineOnly
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        Self::alias(value).map(|_| ())
    }

    fn compile(&self, operand: &str, value: &Value, _target: FieldTarget) -> Result<Fragment, OpError> {
        let alias = Self::alias(value)?;
        let path = naming::field_path(&naming::storage_field(operand));
        Ok(Fragment::Stages(vec![
            Stage::new(StageKind::Unwind, Json::String(path.clone())),
            Stage::new(StageKind::Group, json!({ "_id": path })),
            Stage::new(StageKind::Count, Json::String(alias.to_string())),
        ]))
    }
}
