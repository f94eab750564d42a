#![forbid(unsafe_code)]
//! docql: compile field/operator/value constraints into a flat filter or an
//! aggregation pipeline, and gate anything supplied from outside.
//!
//! Crates:
//! - `docql-core`: values, naming, documents, config, fingerprints.
//! - `docql-operators`: the operator registry.
//! - `docql-planner`: constraints, ACLs, the query builder, pipeline layout.
//! - `docql-sandbox`: pipeline and constraint-document validation.
//! - `docql-limit`: per-caller rate limiting.
//! - `docql-exec`: the request path tying them together.

pub use docql_core as core;
pub use docql_exec as exec;
pub use docql_limit as limit;
pub use docql_operators as operators;
pub use docql_planner as planner;
pub use docql_sandbox as sandbox;

pub mod prelude {
    pub use docql_core::prelude::*;
    pub use docql_exec::{ExecOptions, Executor, MemoryTransport, Source};
    pub use docql_limit::RateLimiter;
    pub use docql_operators::{OperatorTag, Registry};
    pub use docql_planner::{
        Acl, AclFilter, Clause, CompoundConstraint, Compiled, Constraint, Direction, PlanError,
        Query,
    };
    pub use docql_sandbox::{ConstraintTranslator, PipelineValidator, SandboxError};
}
