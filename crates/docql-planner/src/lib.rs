#![forbid(unsafe_code)]
//! docql-planner: constraints -> flat filter or aggregation pipeline.
//!
//! Design:
//! - `constraint`: immutable field/operator/value triples and OR/AND compounds.
//! - `acl`: permission maps and the null-safe `_rperm`/`_wperm` filters.
//! - `query`: the builder; decides find vs. aggregate by asking the registry
//!   whether any attached operator is pipeline-only.
//! - `pipeline`: deterministic stage layout (leading match, operator stages,
//!   sort/project, then limit and skip).
//! - `dsl`: YAML query descriptions -> `Query`.
//!
//! NOTE: No transport here; compiled output is handed to a `Transport`.

pub mod acl;
pub mod compile;
pub mod constraint;
pub mod dsl;
pub mod error;
pub mod pipeline;
pub mod query;

pub use acl::{Acl, AclFilter, Permission};
pub use compile::Compiled;
pub use constraint::{Clause, Combinator, CompoundConstraint, Constraint};
pub use dsl::yaml::{parse_yaml_query, ParsedQuery, QueryConfig};
pub use error::{PlanError, Result};
pub use pipeline::PipelineBuilder;
pub use query::{Direction, Query};
