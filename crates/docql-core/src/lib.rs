#![forbid(unsafe_code)]
//! docql-core: shared vocabulary for the constraint compiler.
//!
//! - `value`: constraint values (scalars, pointers, geo points, subqueries).
//! - `naming`: the single canonical field-naming transform.
//! - `document`: pipeline stages, find requests, and the `Transport` seam.
//! - `config`: compiler configuration with env overrides.
//! - `hash`/`manifest`: deterministic fingerprints of compiled requests.
//!
//! Nothing in here performs I/O.

pub mod config;
pub mod document;
pub mod error;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod naming;
pub mod prelude;
pub mod value;

/// Crate version, stamped into compile manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
