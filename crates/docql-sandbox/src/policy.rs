//! The shared allow/deny policy.

use std::collections::BTreeSet;

use docql_core::config::CompilerConfig;
use once_cell::sync::Lazy;

/// Stages an agent pipeline may use.
pub const ALLOWED_STAGES: &[&str] = &[
    "$match",
    "$group",
    "$sort",
    "$project",
    "$limit",
    "$skip",
    "$lookup",
    "$unwind",
    "$count",
    "$facet",
    "$addFields",
];

/// Expression and query operators accepted inside pipeline stage payloads.
pub const ALLOWED_PIPELINE_OPERATORS: &[&str] = &[
    // comparison
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$cmp",
    // logical
    "$and", "$or", "$not", "$nor",
    // existence / type
    "$exists", "$type", "$ifNull", "$cond",
    // array
    "$all", "$size", "$elemMatch", "$arrayElemAt", "$setEquals", "$setIsSubset",
    "$setUnion", "$setIntersection", "$setDifference", "$concatArrays", "$isArray",
    "$slice", "$first", "$last", "$filter", "$map",
    // string
    "$regex", "$options", "$split", "$concat", "$toLower", "$toUpper", "$strLenCP",
    // arithmetic
    "$add", "$subtract", "$multiply", "$divide", "$mod", "$abs",
    // accumulators
    "$sum", "$avg", "$min", "$max", "$push", "$addToSet", "$count",
    // geo
    "$near", "$nearSphere", "$geoWithin", "$within", "$box", "$centerSphere",
    "$maxDistance", "$maxDistanceInMiles", "$maxDistanceInKilometers",
    // misc
    "$expr", "$literal",
];

/// Operators accepted in agent constraint documents.
pub const ALLOWED_CONSTRAINT_OPERATORS: &[&str] = &[
    "$eq", "$ne", "$gt", "$gte", "$lt", "$lte", "$in", "$nin", "$all", "$size",
    "$exists", "$regex", "$options", "$elemMatch", "$near", "$nearSphere",
    "$maxDistanceInMiles", "$maxDistanceInKilometers", "$within", "$box", "$or", "$and",
];

/// Constructs that execute code or write to storage. Rejected everywhere.
pub const DENIED_CONSTRUCTS: &[&str] = &["$out", "$merge", "$function", "$accumulator", "$where"];

/// Additionally denied inside constraint documents: raw expression injection.
pub const DENIED_IN_CONSTRAINTS: &[&str] = &["$expr"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    pub allowed_stages: BTreeSet<String>,
    pub allowed_pipeline_operators: BTreeSet<String>,
    pub allowed_constraint_operators: BTreeSet<String>,
    pub denied: BTreeSet<String>,
    pub denied_in_constraints: BTreeSet<String>,
    pub max_stages: usize,
    pub max_depth: usize,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::with_limits(20, 10)
    }
}

impl SandboxPolicy {
    pub fn with_limits(max_stages: usize, max_depth: usize) -> Self {
        Self {
            allowed_stages: set(ALLOWED_STAGES),
            allowed_pipeline_operators: set(ALLOWED_PIPELINE_OPERATORS),
            allowed_constraint_operators: set(ALLOWED_CONSTRAINT_OPERATORS),
            denied: set(DENIED_CONSTRUCTS),
            denied_in_constraints: set(DENIED_IN_CONSTRAINTS),
            max_stages,
            max_depth,
        }
    }

    pub fn from_config(cfg: &CompilerConfig) -> Self {
        Self::with_limits(cfg.max_pipeline_stages, cfg.max_depth)
    }

    /// Deny always wins: allowing a denied construct has no effect.
    pub fn allow_stage(mut self, stage: &str) -> Self {
        self.allowed_stages.insert(stage.to_string());
        self
    }

    pub fn allow_pipeline_operator(mut self, op: &str) -> Self {
        self.allowed_pipeline_operators.insert(op.to_string());
        self
    }

    pub fn is_denied(&self, key: &str) -> bool {
        self.denied.contains(key)
    }

    pub fn is_denied_in_constraint(&self, key: &str) -> bool {
        self.denied.contains(key) || self.denied_in_constraints.contains(key)
    }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

static DEFAULT: Lazy<SandboxPolicy> = Lazy::new(SandboxPolicy::default);

pub fn default_policy() -> &'static SandboxPolicy {
    &DEFAULT
}
