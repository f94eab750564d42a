//! String pattern operators.

use docql_core::naming::{self, FieldTarget};
use docql_core::value::Value;
use serde_json::{Map, Value as Json};

use crate::fragment::Fragment;
use crate::registry::OperatorTag;
use crate::traits::{OpError, OperatorStrategy};

const REGEX_OPTIONS: &[char] = &['i', 'm', 'x', 's'];

/// `{field: {$regex: pattern[, $options: flags]}}`.
///
/// Value is either the pattern string or `{pattern, options}`.
pub struct Regex;

impl Regex {
    fn parts(value: &Value) -> Result<(&str, Option<&str>), OpError> {
        match value {
            Value::String(p) => Ok((p, None)),
            Value::Object(map) => {
                let pattern = map.get("pattern").and_then(Value::as_str).ok_or_else(|| {
                    OpError::argument(OperatorTag::Regex, "object form requires a 'pattern' string")
                })?;
                let options = match map.get("options") {
                    None => None,
                    Some(Value::String(o)) => Some(o.as_str()),
                    Some(other) => {
                        return Err(OpError::argument(
                            OperatorTag::Regex,
                            format!("'options' must be a string, got {}", other.type_name()),
                        ))
                    }
                };
                Ok((pattern, options))
            }
            other => Err(OpError::argument(
                OperatorTag::Regex,
                format!("expects a pattern string, got {}", other.type_name()),
            )),
        }
    }
}

impl OperatorStrategy for Regex {
    fn tag(&self) -> OperatorTag {
        OperatorTag::Regex
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        let (_, options) = Self::parts(value)?;
        if let Some(opts) = options {
            if let Some(bad) = opts.chars().find(|c| !REGEX_OPTIONS.contains(c)) {
                return Err(OpError::argument(
                    self.tag(),
                    format!("unsupported regex option '{}'", bad),
                ));
            }
        }
        Ok(())
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        let (pattern, options) = Self::parts(value)?;
        let mut cond = Map::new();
        cond.insert("$regex".into(), Json::String(pattern.to_string()));
        if let Some(opts) = options.filter(|o| !o.is_empty()) {
            cond.insert("$options".into(), Json::String(opts.to_string()));
        }
        Ok(Fragment::filter(
            naming::field_for(operand, target),
            Json::Object(cond),
        ))
    }
}

/// Anchored, escaped prefix match.
pub struct StartsWith;

impl OperatorStrategy for StartsWith {
    fn tag(&self) -> OperatorTag {
        OperatorTag::StartsWith
    }

    fn validate(&self, value: &Value) -> Result<(), OpError> {
        match value {
            Value::String(_) => Ok(()),
            other => Err(OpError::argument(
                self.tag(),
                format!("expects a string prefix, got {}", other.type_name()),
            )),
        }
    }

    fn compile(&self, operand: &str, value: &Value, target: FieldTarget) -> Result<Fragment, OpError> {
        let prefix = value
            .as_str()
            .ok_or_else(|| OpError::argument(self.tag(), "expects a string prefix"))?;
        let mut cond = Map::new();
        cond.insert(
            "$regex".into(),
            Json::String(format!("^{}", escape_regex(prefix))),
        );
        Ok(Fragment::filter(
            naming::field_for(operand, target),
            Json::Object(cond),
        ))
    }
}

/// Backslash-escape every regex metacharacter.
pub fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(
            ch,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
                | '#' | '&' | '-' | '~'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
