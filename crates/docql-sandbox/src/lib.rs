#![forbid(unsafe_code)]
//! docql-sandbox: gatekeeper for pipelines and constraint documents that
//! come from users or agents.
//!
//! Both validators share one `SandboxPolicy`:
//! - a closed allow-list of stages and operators,
//! - a deny-list of constructs that execute code or write to storage,
//! - a stage-count ceiling and a nesting-depth ceiling.
//!
//! Validation is an explicit recursive walk with an explicit depth counter.
//! Denied constructs are found at any depth and are never sanitized away.

pub mod constraint;
pub mod error;
pub mod pipeline;
pub mod policy;
mod walk;

pub use constraint::ConstraintTranslator;
pub use error::{Reason, Result, SandboxError};
pub use pipeline::PipelineValidator;
pub use policy::{default_policy, SandboxPolicy};
