#![forbid(unsafe_code)]
//! docql-operators: the closed operator registry.
//!
//! Design intent:
//! - Every operator tag maps to exactly one `OperatorStrategy`.
//! - A strategy is either *direct* (a fragment under the field key of a flat
//!   filter) or *pipeline-only* (a run of aggregation stages).
//! - The query builder only talks to `Registry`; adding an operator means a
//!   new tag plus a new registry entry, nothing else.

pub mod fragment;
pub mod registry;
pub mod traits;

pub mod array;
pub mod comparison;
pub mod geo;
pub mod join;
pub mod subquery;
pub mod text;

pub use fragment::{Fragment, StrategyKind};
pub use registry::{standard_registry, OperatorTag, Registry};
pub use traits::{OpError, OperatorStrategy};
