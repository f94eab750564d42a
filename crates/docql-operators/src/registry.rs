//! Operator tags and the registry that maps them to strategies.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::array::{ArrayPosition, CountDistinct, SetOperator};
use crate::comparison::{Between, Compare, Equals, Exists, Membership, Size};
use crate::fragment::StrategyKind;
use crate::geo::{Near, WithinBox, WithinDistance};
use crate::join::LinkedPointer;
use crate::subquery::{ElemMatch, KeySelect, QueryMembership};
use crate::text::{Regex, StartsWith};
use crate::traits::{OpError, OperatorStrategy};

/// Closed set of operator identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorTag {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    All,
    Size,
    Between,
    Exists,
    Regex,
    StartsWith,
    Near,
    WithinMiles,
    WithinKilometers,
    WithinBox,
    ElemMatch,
    Select,
    Reject,
    InQuery,
    NotInQuery,
    SetEquals,
    SubsetOf,
    SupersetOf,
    First,
    Last,
    CountDistinct,
    EqualsLinkedPointer,
    DoesNotEqualLinkedPointer,
}

impl OperatorTag {
    pub const ALL: [OperatorTag; 31] = [
        OperatorTag::Eq,
        OperatorTag::Ne,
        OperatorTag::Gt,
        OperatorTag::Gte,
        OperatorTag::Lt,
        OperatorTag::Lte,
        OperatorTag::In,
        OperatorTag::Nin,
        OperatorTag::All,
        OperatorTag::Size,
        OperatorTag::Between,
        OperatorTag::Exists,
        OperatorTag::Regex,
        OperatorTag::StartsWith,
        OperatorTag::Near,
        OperatorTag::WithinMiles,
        OperatorTag::WithinKilometers,
        OperatorTag::WithinBox,
        OperatorTag::ElemMatch,
        OperatorTag::Select,
        OperatorTag::Reject,
        OperatorTag::InQuery,
        OperatorTag::NotInQuery,
        OperatorTag::SetEquals,
        OperatorTag::SubsetOf,
        OperatorTag::SupersetOf,
        OperatorTag::First,
        OperatorTag::Last,
        OperatorTag::CountDistinct,
        OperatorTag::EqualsLinkedPointer,
        OperatorTag::DoesNotEqualLinkedPointer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperatorTag::Eq => "eq",
            OperatorTag::Ne => "ne",
            OperatorTag::Gt => "gt",
            OperatorTag::Gte => "gte",
            OperatorTag::Lt => "lt",
            OperatorTag::Lte => "lte",
            OperatorTag::In => "in",
            OperatorTag::Nin => "nin",
            OperatorTag::All => "all",
            OperatorTag::Size => "size",
            OperatorTag::Between => "between",
            OperatorTag::Exists => "exists",
            OperatorTag::Regex => "regex",
            OperatorTag::StartsWith => "starts_with",
            OperatorTag::Near => "near",
            OperatorTag::WithinMiles => "within_miles",
            OperatorTag::WithinKilometers => "within_kilometers",
            OperatorTag::WithinBox => "within_box",
            OperatorTag::ElemMatch => "elem_match",
            OperatorTag::Select => "select",
            OperatorTag::Reject => "reject",
            OperatorTag::InQuery => "in_query",
            OperatorTag::NotInQuery => "not_in_query",
            OperatorTag::SetEquals => "set_equals",
            OperatorTag::SubsetOf => "subset_of",
            OperatorTag::SupersetOf => "superset_of",
            OperatorTag::First => "first",
            OperatorTag::Last => "last",
            OperatorTag::CountDistinct => "count_distinct",
            OperatorTag::EqualsLinkedPointer => "equals_linked_pointer",
            OperatorTag::DoesNotEqualLinkedPointer => "does_not_equal_linked_pointer",
        }
    }
}

impl fmt::Display for OperatorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorTag {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = match s {
            "like" => OperatorTag::Regex,
            "not" | "not_eq" => OperatorTag::Ne,
            "contained_in" => OperatorTag::In,
            "not_in" => OperatorTag::Nin,
            "contains_all" => OperatorTag::All,
            "matches_key_in_query" => OperatorTag::Select,
            "does_not_match_key_in_query" => OperatorTag::Reject,
            other => *OperatorTag::ALL
                .iter()
                .find(|t| t.as_str() == other)
                .ok_or_else(|| OpError::InvalidOperator(other.to_string()))?,
        };
        Ok(tag)
    }
}

/// Tag -> strategy table.
pub struct Registry {
    strategies: HashMap<OperatorTag, Arc<dyn OperatorStrategy>>,
}

impl Registry {
    /// Empty registry; every lookup fails until strategies are registered.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registry with every built-in strategy.
    pub fn standard() -> Self {
        let mut r = Self::empty();
        r.register(Equals);
        r.register(Compare::new(OperatorTag::Ne, "$ne"));
        r.register(Compare::new(OperatorTag::Gt, "$gt"));
        r.register(Compare::new(OperatorTag::Gte, "$gte"));
        r.register(Compare::new(OperatorTag::Lt, "$lt"));
        r.register(Compare::new(OperatorTag::Lte, "$lte"));
        r.register(Membership::new(OperatorTag::In, "$in"));
        r.register(Membership::new(OperatorTag::Nin, "$nin"));
        r.register(Membership::new(OperatorTag::All, "$all"));
        r.register(Size);
        r.register(Between);
        r.register(Exists);
        r.register(Regex);
        r.register(StartsWith);
        r.register(Near);
        r.register(WithinDistance::miles());
        r.register(WithinDistance::kilometers());
        r.register(WithinBox);
        r.register(ElemMatch);
        r.register(KeySelect::select());
        r.register(KeySelect::reject());
        r.register(QueryMembership::in_query());
        r.register(QueryMembership::not_in_query());
        r.register(SetOperator::new(OperatorTag::SetEquals));
        r.register(SetOperator::new(OperatorTag::SubsetOf));
        r.register(SetOperator::new(OperatorTag::SupersetOf));
        r.register(ArrayPosition::first());
        r.register(ArrayPosition::last());
        r.register(CountDistinct);
        r.register(LinkedPointer::equals());
        r.register(LinkedPointer::does_not_equal());
        r
    }

    /// Add or replace the strategy for `strategy.tag()`.
    pub fn register<S: OperatorStrategy>(&mut self, strategy: S) {
        self.strategies.insert(strategy.tag(), Arc::new(strategy));
    }

    pub fn get(&self, tag: OperatorTag) -> Result<&dyn OperatorStrategy, OpError> {
        self.strategies
            .get(&tag)
            .map(|s| s.as_ref())
            .ok_or_else(|| OpError::InvalidOperator(tag.to_string()))
    }

    /// Parse a string tag and resolve it in one step.
    pub fn lookup(&self, name: &str) -> Result<&dyn OperatorStrategy, OpError> {
        self.get(name.parse()?)
    }

    pub fn kind_of(&self, tag: OperatorTag) -> Result<StrategyKind, OpError> {
        Ok(self.get(tag)?.kind())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

static STANDARD: Lazy<Registry> = Lazy::new(Registry::standard);

/// Process-wide read-only registry with the built-in strategies.
pub fn standard_registry() -> &'static Registry {
    &STANDARD
}
