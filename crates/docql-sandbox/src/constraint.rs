//! Validation and translation of agent-supplied constraint documents.
//!
//! A constraint document is a REST-style filter:
//! `{ "status": "open", "age": {"$gte": 18}, "$or": [{...}, {...}] }`.
//! Raw expressions (`$expr`) and code execution constructs are rejected, so
//! the only way in is through the registered operators.

use docql_core::config::CompilerConfig;
use docql_core::value::Value;
use docql_operators::OperatorTag;
use docql_planner::{Clause, CompoundConstraint, Constraint};
use serde_json::{Map, Value as Json};

use crate::error::{Result, SandboxError};
use crate::pipeline::json_kind;
use crate::policy::{default_policy, SandboxPolicy};
use crate::walk::{Mode, Walker};

#[derive(Debug, Clone)]
pub struct ConstraintTranslator {
    policy: SandboxPolicy,
}

impl Default for ConstraintTranslator {
    fn default() -> Self {
        Self::new(default_policy().clone())
    }
}

impl ConstraintTranslator {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(cfg: &CompilerConfig) -> Self {
        Self::new(SandboxPolicy::from_config(cfg))
    }

    pub fn validate(&self, doc: &Json) -> Result<()> {
        let out = self.check(doc);
        #[cfg(feature = "tracing")]
        if let Err(e) = &out {
            tracing::warn!(error = %e, security = e.is_security(), "constraint document rejected");
        }
        out
    }

    /// Never fails.
    pub fn is_valid(&self, doc: &Json) -> bool {
        self.check(doc).is_ok()
    }

    /// Validate, then turn the document into clauses ready for
    /// [`Query::where_all`](docql_planner::Query::where_all).
    pub fn translate(&self, doc: &Json) -> Result<Vec<Clause>> {
        self.validate(doc)?;
        match doc {
            Json::Object(map) => translate_object(map),
            _ => Ok(Vec::new()),
        }
    }

    fn check(&self, doc: &Json) -> Result<()> {
        if !doc.is_object() {
            return Err(SandboxError::InvalidConstraint(format!(
                "expected an object, got {}",
                json_kind(doc)
            )));
        }
        Walker::new(&self.policy, Mode::Constraint).walk(doc, 1)
    }
}

fn translate_object(map: &Map<String, Json>) -> Result<Vec<Clause>> {
    let mut out = Vec::new();
    for (key, value) in map {
        match key.as_str() {
            "$or" => out.push(CompoundConstraint::or(branches(key, value)?).into()),
            "$and" => out.push(CompoundConstraint::and(branches(key, value)?).into()),
            field => out.extend(translate_field(field, value)?),
        }
    }
    Ok(out)
}

/// Each branch of `$or`/`$and` becomes one AND group.
fn branches(key: &str, value: &Json) -> Result<Vec<Clause>> {
    let items = value.as_array().ok_or_else(|| {
        SandboxError::InvalidConstraint(format!("{} expects an array of documents", key))
    })?;
    let mut groups = Vec::with_capacity(items.len());
    for item in items {
        let map = item.as_object().ok_or_else(|| {
            SandboxError::InvalidConstraint(format!("{} branch must be an object", key))
        })?;
        groups.push(CompoundConstraint::and(translate_object(map)?).into());
    }
    Ok(groups)
}

fn translate_field(field: &str, value: &Json) -> Result<Vec<Clause>> {
    let ops = match value {
        Json::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
        // plain value or `__type` envelope
        _ => return Ok(vec![Constraint::eq(field, Value::from_json(value))?.into()]),
    };

    let mut out: Vec<Clause> = Vec::new();
    for (op, operand) in ops {
        let constraint = match op.as_str() {
            // consumed together with their partner key
            "$options" | "$maxDistanceInMiles" | "$maxDistanceInKilometers" => continue,
            "$regex" => {
                let value = match ops.get("$options") {
                    Some(options) => Value::from_json(&serde_json::json!({
                        "pattern": operand,
                        "options": options,
                    })),
                    None => Value::from_json(operand),
                };
                Constraint::new(field, OperatorTag::Regex, value)?
            }
            "$near" | "$nearSphere" => near(field, operand, ops)?,
            "$within" => {
                let corners = operand.get("$box").ok_or_else(|| {
                    SandboxError::InvalidConstraint(format!(
                        "$within on '{}' requires $box",
                        field
                    ))
                })?;
                Constraint::new(field, OperatorTag::WithinBox, Value::from_json(corners))?
            }
            other => {
                let tag = direct_tag(other).ok_or_else(|| {
                    SandboxError::InvalidConstraint(format!(
                        "'{}' cannot be used on field '{}'",
                        other, field
                    ))
                })?;
                Constraint::new(field, tag, Value::from_json(operand))?
            }
        };
        out.push(constraint.into());
    }
    Ok(out)
}

fn near(field: &str, point: &Json, ops: &Map<String, Json>) -> Result<Constraint> {
    let point = Value::from_json(point);
    let bounded = |tag: OperatorTag, distance: &Json| -> Result<Constraint> {
        let value = docql_core::value::object([
            ("point", point.clone()),
            ("distance", Value::from_json(distance)),
        ]);
        Ok(Constraint::new(field, tag, value)?)
    };
    if let Some(d) = ops.get("$maxDistanceInMiles") {
        return bounded(OperatorTag::WithinMiles, d);
    }
    if let Some(d) = ops.get("$maxDistanceInKilometers") {
        return bounded(OperatorTag::WithinKilometers, d);
    }
    Ok(Constraint::new(field, OperatorTag::Near, point)?)
}

fn direct_tag(op: &str) -> Option<OperatorTag> {
    Some(match op {
        "$eq" => OperatorTag::Eq,
        "$ne" => OperatorTag::Ne,
        "$gt" => OperatorTag::Gt,
        "$gte" => OperatorTag::Gte,
        "$lt" => OperatorTag::Lt,
        "$lte" => OperatorTag::Lte,
        "$in" => OperatorTag::In,
        "$nin" => OperatorTag::Nin,
        "$all" => OperatorTag::All,
        "$size" => OperatorTag::Size,
        "$exists" => OperatorTag::Exists,
        "$elemMatch" => OperatorTag::ElemMatch,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operator_map_splits_into_constraints() {
        let t = ConstraintTranslator::default();
        let clauses = t
            .translate(&json!({"age": {"$gte": 18, "$lt": 65}}))
            .unwrap();
        assert_eq!(clauses.len(), 2);
    }

    #[test]
    fn regex_keeps_options() {
        let t = ConstraintTranslator::default();
        let clauses = t
            .translate(&json!({"name": {"$regex": "^bo", "$options": "i"}}))
            .unwrap();
        assert_eq!(clauses.len(), 1);
        let leaves = clauses[0].constraints();
        assert_eq!(leaves[0].operator(), OperatorTag::Regex);
    }

    #[test]
    fn expr_is_a_security_violation() {
        let t = ConstraintTranslator::default();
        let err = t
            .validate(&json!({"$expr": {"$gt": ["$a", "$b"]}}))
            .unwrap_err();
        assert!(err.is_security());
    }
}
