//! Pointer-to-pointer join: "`operand` on this record equals/does not equal
//! `field` on the record reached through pointer `through`".
//!
//! Always three stages, in order: `$addFields`, `$lookup`, `$match`.

use docql_core::document::{Stage, StageKind};
use docql_core::naming::{self, FieldTarget};
use docql_core::value::Value;
use serde_json::json;

use crate::fragment::{Fragment, StrategyKind};
use crate::registry::OperatorTag;
use crate::traits::{OpError, OperatorStrategy};

pub struct LinkedPointer {
    tag: OperatorTag,
    comparator: &'static str,
}

/// Resolved `{through, field, class_name?}` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOptions {
    pub through: String,
    pub field: String,
    pub class_name: String,
}

impl LinkedPointer {
    pub fn equals() -> Self {
        Self {
            tag: OperatorTag::EqualsLinkedPointer,
            comparator: "$eq",
        }
    }

    pub fn does_not_equal() -> Self {
        Self {
            tag: OperatorTag::DoesNotEqualLinkedPointer,
            comparator: "$ne",
        }
    }

    pub fn options(&self, value: &Value) -> Result<JoinOptions, OpError> {
        let map = value.as_object().ok_or_else(|| {
            OpError::argument(
                self.tag,
                format!("options must be an object, got {}", value.type_name()),
            )
        })?;
        let through = required(self.tag, map.get("through"), "through")?;
        let field = required(self.tag, map.get("field"), "field")?;
        let class_name = match map.get("class_name") {
            Some(Value::String(c)) if !c.is_empty() => c.clone(),
            Some(_) => {
                return Err(OpError::argument(
                    self.tag,
                    "option 'class_name' must be a non-empty string",
                ))
            }
            None => naming::class_name(&through),
        };
        Ok(JoinOptions {
            through,
            field,
            class_name,
        })
    }
}

fn required(tag: OperatorTag, value: Option<&Value>, name: &str) -> Result<String, OpError> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(_) => Err(OpError::argument(
            tag,
            format!("option '{}' must be a non-empty string", name),
        )),
        None => Err(OpError::argument(
            tag,
            format!("requires the '{}' option", name),
        )),
    }
}

impl OperatorStrategy for LinkedPointer {
    fn tag(&self) -> OperatorTag {
        self.tag
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::PipelineOnly
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        self.options(value).map(|_| ())
    }

    fn compile(&self, operand: &str, value: &Value, _target: FieldTarget) -> Result<Fragment, OpError> {
        let opts = self.options(value)?;
        let local = naming::pointer_field(&opts.through);
        let alias = naming::lookup_alias(&opts.through);

        // `_p_<through>` holds `Class$id`; the lookup joins on the bare id.
        let add_fields = Stage::new(
            StageKind::AddFields,
            json!({
                local.clone(): {
                    "$arrayElemAt": [
                        { "$split": [naming::field_path(&local), { "$literal": "$" }] },
                        1
                    ]
                }
            }),
        );
        let lookup = Stage::new(
            StageKind::Lookup,
            json!({
                "from": opts.class_name,
                "localField": local,
                "foreignField": naming::STORAGE_ID,
                "as": alias,
            }),
        );
        let linked = format!("{}.{}", alias, naming::pointer_field(&opts.field));
        let matcher = Stage::new(
            StageKind::Match,
            json!({
                "$expr": {
                    self.comparator: [
                        { "$arrayElemAt": [naming::field_path(&linked), 0] },
                        naming::field_path(&naming::pointer_field(operand)),
                    ]
                }
            }),
        );
        Ok(Fragment::Stages(vec![add_fields, lookup, matcher]))
    }
}
