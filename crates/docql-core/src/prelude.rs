//! Convenient re-exports for downstream crates.

pub use crate::config::CompilerConfig;
pub use crate::document::{Document, FindRequest, Pipeline, Stage, StageKind, Transport};
pub use crate::error::{Error, Result};
pub use crate::hash::Fingerprint;
pub use crate::id::RequestId;
pub use crate::manifest::{CompileManifest, RequestKind};
pub use crate::naming::FieldTarget;
pub use crate::value::{GeoPoint, Pointer, Subquery, Value};
