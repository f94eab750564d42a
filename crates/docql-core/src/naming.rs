//! The one canonical field-naming transform.
//!
//! Every field name that reaches a backend goes through this module:
//! - REST filters use lowerCamel names (`created_at` -> `createdAt`).
//! - Storage-level documents (pipeline `$match`, `$lookup`) use the raw column
//!   names (`_id`, `_created_at`, `_p_<field>` for pointer columns).
//! - Join targets derive a class name from the pointer field (`project` -> `Project`).
//!
//! Names that already start with `_` are treated as raw storage columns and
//! pass through untouched in both targets.

use serde::{Deserialize, Serialize};

/// Which backend vocabulary a document is being compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldTarget {
    /// Flat filter for the REST query endpoint.
    Rest,
    /// Aggregation pipeline executed against raw storage.
    Storage,
}

/// Prefix for pointer columns in storage.
pub const POINTER_PREFIX: &str = "_p_";

/// Storage id column, the `foreignField` of every join.
pub const STORAGE_ID: &str = "_id";

/// snake_case -> lowerCamelCase. Already camel-cased input is returned as-is.
pub fn to_camel(field: &str) -> String {
    if field.starts_with('_') {
        return field.to_string();
    }
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for ch in field.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Field name as seen by the REST endpoint.
pub fn rest_field(field: &str) -> String {
    match field {
        "id" | "object_id" | "objectId" => "objectId".to_string(),
        "created_at" | "createdAt" => "createdAt".to_string(),
        "updated_at" | "updatedAt" => "updatedAt".to_string(),
        other => to_camel(other),
    }
}

/// Field name as stored in the backing collection.
pub fn storage_field(field: &str) -> String {
    match field {
        "id" | "object_id" | "objectId" => STORAGE_ID.to_string(),
        "created_at" | "createdAt" => "_created_at".to_string(),
        "updated_at" | "updatedAt" => "_updated_at".to_string(),
        other => to_camel(other),
    }
}

/// Field name for `target`.
pub fn field_for(field: &str, target: FieldTarget) -> String {
    match target {
        FieldTarget::Rest => rest_field(field),
        FieldTarget::Storage => storage_field(field),
    }
}

/// Storage column holding a pointer: `author` -> `_p_author`.
pub fn pointer_field(field: &str) -> String {
    if field.starts_with(POINTER_PREFIX) {
        return field.to_string();
    }
    format!("{}{}", POINTER_PREFIX, to_camel(field))
}

/// Collection name a pointer field refers to: `team_member` -> `TeamMember`.
///
/// The built-in system collections carry a leading underscore.
pub fn class_name(field: &str) -> String {
    match field {
        "user" | "users" | "User" | "_User" => return "_User".to_string(),
        "role" | "roles" | "Role" | "_Role" => return "_Role".to_string(),
        "session" | "Session" | "_Session" => return "_Session".to_string(),
        "installation" | "Installation" | "_Installation" => {
            return "_Installation".to_string()
        }
        _ => {}
    }
    let camel = to_camel(field);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Name of the array a `$lookup` materializes for a pointer field.
pub fn lookup_alias(through: &str) -> String {
    format!("{}_data", through)
}

/// `$`-prefixed field path for aggregation expressions.
pub fn field_path(field: &str) -> String {
    format!("${}", field)
}
