//! Operators whose value is a nested document or another query.

use docql_core::naming::{self, FieldTarget};
use docql_core::value::{Subquery, Value};
use serde_json::json;

use crate::comparison::single;
use crate::fragment::Fragment;
use crate::registry::OperatorTag;
use crate::traits::{OpError, OperatorStrategy};

/// `{field: {$elemMatch: {...}}}`
pub struct ElemMatch;

impl OperatorStrategy for ElemMatch {
    fn tag(&self) -> OperatorTag {
        OperatorTag::ElemMatch
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        match value {
            Value::Object(map) if !map.is_empty() => Ok(()),
            Value::Object(_) => Err(OpError::argument(self.tag(), "criteria must not be empty")),
            other => Err(OpError::argument(
                self.tag(),
                format!("expects an object of element criteria, got {}", other.type_name()),
            )),
        }
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        Ok(Fragment::filter(
            naming::field_for(operand, target),
            single("$elemMatch", value.to_json(target)),
        ))
    }
}

/// `$select` / `$dontSelect`: match `field` against `key` of the records
/// returned by a subquery. Value is `{key, query}`. Find requests only.
pub struct KeySelect {
    tag: OperatorTag,
    op: &'static str,
}

impl KeySelect {
    pub fn select() -> Self {
        Self {
            tag: OperatorTag::Select,
            op: "$select",
        }
    }

    pub fn reject() -> Self {
        Self {
            tag: OperatorTag::Reject,
            op: "$dontSelect",
        }
    }

    fn parts<'a>(&self, value: &'a Value) -> Result<(&'a str, &'a Subquery), OpError> {
        let map = value
            .as_object()
            .ok_or_else(|| OpError::argument(self.tag, "expects {key, query}"))?;
        let key = map
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| OpError::argument(self.tag, "requires a 'key' string"))?;
        match map.get("query") {
            Some(Value::Subquery(q)) => Ok((key, q)),
            _ => Err(OpError::argument(self.tag, "requires a compiled 'query'")),
        }
    }
}

impl OperatorStrategy for KeySelect {
    fn tag(&self) -> OperatorTag {
        self.tag
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        self.parts(value).map(|_| ())
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        if target == FieldTarget::Storage {
            return Err(OpError::rest_only(self.tag));
        }
        let (key, query) = self.parts(value)?;
        Ok(Fragment::filter(
            naming::field_for(operand, target),
            single(
                self.op,
                json!({ "query": query.to_json(), "key": naming::rest_field(key) }),
            ),
        ))
    }
}

/// `$inQuery` / `$notInQuery` on a pointer field. Find requests only.
pub struct QueryMembership {
    tag: OperatorTag,
    op: &'static str,
}

impl QueryMembership {
    pub fn in_query() -> Self {
        Self {
            tag: OperatorTag::InQuery,
            op: "$inQuery",
        }
    }

    pub fn not_in_query() -> Self {
        Self {
            tag: OperatorTag::NotInQuery,
            op: "$notInQuery",
        }
    }
}

impl OperatorStrategy for QueryMembership {
    fn tag(&self) -> OperatorTag {
        self.tag
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        match value {
            Value::Subquery(_) => Ok(()),
            other => Err(OpError::argument(
                self.tag,
                format!("expects a compiled query, got {}", other.type_name()),
            )),
        }
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        if target == FieldTarget::Storage {
            return Err(OpError::rest_only(self.tag));
        }
        match value {
            Value::Subquery(q) => Ok(Fragment::filter(
                naming::field_for(operand, target),
                single(self.op, q.to_json()),
            )),
            _ => Err(OpError::argument(self.tag, "expects a compiled query")),
        }
    }
}
