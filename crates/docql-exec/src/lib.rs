#![forbid(unsafe_code)]
//! docql-exec: the request path around the compiler.
//!
//! `Executor` compiles a query, routes pipelines through the rate limiter
//! (untrusted agents only) and the sandbox, hands the result to a
//! `Transport`, and emits a `CompileManifest` per request.
//! `MemoryTransport` is an in-process transport for tests and dry runs.

pub mod executor;
pub mod memory;
pub mod metrics;

pub use executor::{ExecError, ExecOptions, Execution, Executor, Source};
pub use memory::{MemoryTransport, Recorded};
