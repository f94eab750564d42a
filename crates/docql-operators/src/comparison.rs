//! Direct comparison, membership, and existence operators.

use docql_core::naming::FieldTarget;
use docql_core::value::Value;
use serde_json::{json, Map, Value as Json};

use crate::fragment::{filter_key, Fragment};
use crate::registry::OperatorTag;
use crate::traits::{OpError, OperatorStrategy};

/// `{field: value}`
pub struct Equals;

impl OperatorStrategy for Equals {
    fn tag(&self) -> OperatorTag {
        OperatorTag::Eq
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        reject_subquery(self.tag(), value)
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        Ok(Fragment::filter(
            filter_key(operand, value, target),
            value.to_json(target),
        ))
    }
}

/// `{field: {$op: value}}` for ne/gt/gte/lt/lte.
pub struct Compare {
    tag: OperatorTag,
    key: &'static str,
}

impl Compare {
    pub fn new(tag: OperatorTag, key: &'static str) -> Self {
        Self { tag, key }
    }
}

impl OperatorStrategy for Compare {
    fn tag(&self) -> OperatorTag {
        self.tag
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        reject_subquery(self.tag, value)?;
        if self.tag == OperatorTag::Ne {
            return Ok(());
        }
        match value {
            Value::Null | Value::Array(_) | Value::Object(_) | Value::GeoPoint(_) => Err(
                OpError::argument(self.tag, format!("cannot order by a {} value", value.type_name())),
            ),
            _ => Ok(()),
        }
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        Ok(Fragment::filter(
            filter_key(operand, value, target),
            single(self.key, value.to_json(target)),
        ))
    }
}

/// `$in` / `$nin` / `$all`. Scalars are wrapped into a one-element list.
pub struct Membership {
    tag: OperatorTag,
    key: &'static str,
}

impl Membership {
    pub fn new(tag: OperatorTag, key: &'static str) -> Self {
        Self { tag, key }
    }
}

impl OperatorStrategy for Membership {
    fn tag(&self) -> OperatorTag {
        self.tag
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        match value {
            Value::Object(_) | Value::Subquery(_) => Err(OpError::argument(
                self.tag,
                format!("expects a list of values, got {}", value.type_name()),
            )),
            _ => Ok(()),
        }
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        let list = as_list(value);
        Ok(Fragment::filter(
            filter_key(operand, &list, target),
            single(self.key, list.to_json(target)),
        ))
    }
}

/// `{field: {$size: n}}`
pub struct Size;

impl OperatorStrategy for Size {
    fn tag(&self) -> OperatorTag {
        OperatorTag::Size
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        match value {
            Value::Int(n) if *n >= 0 => Ok(()),
            _ => Err(OpError::argument(
                self.tag(),
                "expects a non-negative integer length",
            )),
        }
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        Ok(Fragment::filter(
            filter_key(operand, value, target),
            single("$size", value.to_json(target)),
        ))
    }
}

/// `{field: {$gte: lo, $lte: hi}}` from an exact `[lo, hi]` pair.
pub struct Between;

impl Between {
    fn bounds(value: &Value) -> Result<(&Value, &Value), OpError> {
        match value.as_array() {
            Some([lo, hi]) => Ok((lo, hi)),
            Some(items) => Err(OpError::argument(
                OperatorTag::Between,
                format!("expects exactly 2 values [min, max], got {}", items.len()),
            )),
            None => Err(OpError::argument(
                OperatorTag::Between,
                format!("expects an array [min, max], got {}", value.type_name()),
            )),
        }
    }
}

impl OperatorStrategy for Between {
    fn tag(&self) -> OperatorTag {
        OperatorTag::Between
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        let (lo, hi) = Self::bounds(value)?;
        for bound in [lo, hi] {
            if matches!(
                bound,
                Value::Null | Value::Array(_) | Value::Object(_) | Value::Subquery(_)
            ) {
                return Err(OpError::argument(
                    self.tag(),
                    format!("bounds must be scalars, got {}", bound.type_name()),
                ));
            }
        }
        Ok(())
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        let (lo, hi) = Self::bounds(value)?;
        let mut cond = Map::new();
        cond.insert("$gte".into(), lo.to_json(target));
        cond.insert("$lte".into(), hi.to_json(target));
        Ok(Fragment::filter(
            filter_key(operand, lo, target),
            Json::Object(cond),
        ))
    }
}

/// `{field: {$exists: bool}}`
pub struct Exists;

impl OperatorStrategy for Exists {
    fn tag(&self) -> OperatorTag {
        OperatorTag::Exists
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        match value {
            Value::Bool(_) => Ok(()),
            other => Err(OpError::argument(
                self.tag(),
                format!("expects true or false, got {}", other.type_name()),
            )),
        }
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        Ok(Fragment::filter(
            docql_core::naming::field_for(operand, target),
            json!({ "$exists": value.to_json(target) }),
        ))
    }
}

pub(crate) fn single(key: &str, value: Json) -> Json {
    let mut m = Map::with_capacity(1);
    m.insert(key.to_string(), value);
    Json::Object(m)
}

pub(crate) fn as_list(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        other => Value::Array(vec![other.clone()]),
    }
}

pub(crate) fn reject_subquery(tag: OperatorTag, value: &Value) -> Result<(), OpError> {
    if let Value::Subquery(_) = value {
        return Err(OpError::argument(
            tag,
            "does not accept a subquery; use in_query/select instead",
        ));
    }
    Ok(())
}
