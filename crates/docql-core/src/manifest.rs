//! Per-request compile manifest for audit logs.
//!
//! The executor emits one after every successful compilation; identical
//! queries share a fingerprint but never a manifest id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Fingerprint;
use crate::id::RequestId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Find,
    Aggregate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileManifest {
    pub id: ManifestId,

    /// Executor-local sequence number.
    pub request: RequestId,

    pub table: String,

    pub kind: RequestKind,

    /// Stable hash of the compiled filter or pipeline.
    pub fingerprint: Fingerprint,

    /// Zero for find requests.
    pub stage_count: usize,

    /// Compiler version string for provenance.
    pub compiler_version: String,

    /// Milliseconds since Unix epoch (UTC).
    pub compiled_ms: u64,
}

impl CompileManifest {
    pub fn new(
        request: RequestId,
        table: impl Into<String>,
        kind: RequestKind,
        fingerprint: Fingerprint,
        compiled_ms: u64,
    ) -> Self {
        Self {
            id: ManifestId(Uuid::new_v4()),
            request,
            table: table.into(),
            kind,
            fingerprint,
            stage_count: 0,
            compiler_version: crate::VERSION.to_string(),
            compiled_ms,
        }
    }

    pub fn with_stage_count(mut self, stage_count: usize) -> Self {
        self.stage_count = stage_count;
        self
    }
}
