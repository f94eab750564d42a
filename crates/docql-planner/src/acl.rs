//! Access-control lists and the filters derived from them.
//!
//! Wire format: `{ "<subject>": { "read": bool, "write": bool } }` where the
//! subject is `*` (public), a raw user id, or `role:<name>`. A subject with
//! neither permission is never present in the map.

use std::collections::BTreeMap;

use docql_core::value::Value;
use docql_operators::OperatorTag;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::constraint::{Clause, CompoundConstraint, Constraint};
use crate::error::Result;

pub const PUBLIC: &str = "*";
pub const ROLE_PREFIX: &str = "role:";

/// Storage column listing subjects allowed to read a record.
pub const READ_FIELD: &str = "_rperm";
/// Storage column listing subjects allowed to write a record.
pub const WRITE_FIELD: &str = "_wperm";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
}

impl Permission {
    pub fn new(read: bool, write: bool) -> Self {
        Self { read, write }
    }

    pub fn is_empty(&self) -> bool {
        !self.read && !self.write
    }
}

/// Subject -> permission map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    entries: BTreeMap<String, Permission>,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Readable and writable by everyone.
    pub fn everyone(read: bool, write: bool) -> Self {
        let mut acl = Self::new();
        acl.apply_public(read, write);
        acl
    }

    /// Set the permission for `subject`. Setting both flags false removes it.
    pub fn apply(&mut self, subject: impl Into<String>, read: bool, write: bool) -> &mut Self {
        let subject = subject.into();
        let perm = Permission::new(read, write);
        if perm.is_empty() {
            self.entries.remove(&subject);
        } else {
            self.entries.insert(subject, perm);
        }
        self
    }

    /// Same as `apply` for the role subject `role:<name>`.
    pub fn apply_role(&mut self, name: &str, read: bool, write: bool) -> &mut Self {
        self.apply(role_subject(name), read, write)
    }

    pub fn apply_public(&mut self, read: bool, write: bool) -> &mut Self {
        self.apply(PUBLIC, read, write)
    }

    pub fn permission(&self, subject: &str) -> Permission {
        self.entries.get(subject).copied().unwrap_or_default()
    }

    /// Explicit grant for `subject` or a public grant.
    pub fn can_read(&self, subject: &str) -> bool {
        self.permission(subject).read || self.permission(PUBLIC).read
    }

    pub fn can_write(&self, subject: &str) -> bool {
        self.permission(subject).write || self.permission(PUBLIC).write
    }

    /// Subjects with read access; this is what storage keeps in `_rperm`.
    pub fn readers(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, p)| p.read)
            .map(|(s, _)| s.as_str())
            .collect()
    }

    /// Subjects with write access; stored in `_wperm`.
    pub fn writers(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, p)| p.write)
            .map(|(s, _)| s.as_str())
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Permission)> {
        self.entries.iter().map(|(s, p)| (s.as_str(), *p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .filter(|(_, p)| !p.is_empty())
                .map(|(s, p)| {
                    (
                        s.clone(),
                        serde_json::json!({ "read": p.read, "write": p.write }),
                    )
                })
                .collect(),
        )
    }
}

impl Serialize for Acl {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().filter(|(_, p)| !p.is_empty()))
    }
}

impl<'de> Deserialize<'de> for Acl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, Permission>::deserialize(deserializer)?;
        Ok(Self {
            entries: raw.into_iter().filter(|(_, p)| !p.is_empty()).collect(),
        })
    }
}

fn role_subject(name: &str) -> String {
    format!("{}{}", ROLE_PREFIX, name.trim_start_matches(ROLE_PREFIX))
}

/// Read/write authorization filters for one caller.
///
/// Records from before permissions existed have no `_rperm`/`_wperm` at all;
/// they must keep matching as if public, so each filter is
/// `(field is null) OR (field contains one of the caller's subjects)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclFilter {
    subjects: Vec<String>,
}

impl AclFilter {
    /// Anonymous caller: public subject only.
    pub fn public() -> Self {
        Self {
            subjects: vec![PUBLIC.to_string()],
        }
    }

    pub fn for_user<I, S>(user_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::public();
        filter.push(user_id.into());
        for role in roles {
            filter.push(role_subject(role.as_ref()));
        }
        filter
    }

    pub fn with_role(mut self, name: &str) -> Self {
        self.push(role_subject(name));
        self
    }

    fn push(&mut self, subject: String) {
        if !subject.is_empty() && !self.subjects.contains(&subject) {
            self.subjects.push(subject);
        }
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn read_clause(&self) -> Result<Clause> {
        self.clause(READ_FIELD)
    }

    pub fn write_clause(&self) -> Result<Clause> {
        self.clause(WRITE_FIELD)
    }

    fn clause(&self, field: &str) -> Result<Clause> {
        let subjects = Value::Array(self.subjects.iter().map(|s| Value::from(s.as_str())).collect());
        Ok(CompoundConstraint::or([
            Constraint::new(field, OperatorTag::Eq, Value::Null)?,
            Constraint::new(field, OperatorTag::In, subjects)?,
        ])
        .into())
    }
}
