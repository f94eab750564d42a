//! Compiled constraint fragments.

use docql_core::document::Stage;
use docql_core::naming::{self, FieldTarget};
use docql_core::value::Value;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Whether an operator fits in a flat filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    Direct,
    PipelineOnly,
}

/// Output of one strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// `{ key: condition }` inside a flat filter document.
    Filter { key: String, condition: Json },
    /// Stages appended to the aggregation pipeline.
    Stages(Vec<Stage>),
}

impl Fragment {
    pub fn filter(key: String, condition: Json) -> Self {
        Fragment::Filter { key, condition }
    }

    pub fn is_pipeline(&self) -> bool {
        matches!(self, Fragment::Stages(_))
    }
}

/// Filter key for `operand`. In storage documents pointer-valued constraints
/// address the `_p_` column, since that is where `Class$id` strings live.
pub fn filter_key(operand: &str, value: &Value, target: FieldTarget) -> String {
    if target == FieldTarget::Storage && holds_pointer(value) {
        return naming::pointer_field(operand);
    }
    naming::field_for(operand, target)
}

fn holds_pointer(value: &Value) -> bool {
    match value {
        Value::Pointer(_) => true,
        Value::Array(items) => !items.is_empty() && items.iter().all(|v| matches!(v, Value::Pointer(_))),
        _ => false,
    }
}
