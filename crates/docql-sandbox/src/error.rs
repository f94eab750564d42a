use std::fmt;

use docql_planner::PlanError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SandboxError>;

/// Machine-readable reason tag carried by every policy violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    CodeExecution,
    UnknownOperator,
    DepthExceeded,
    StageLimitExceeded,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::CodeExecution => "code_execution",
            Reason::UnknownOperator => "unknown_operator",
            Reason::DepthExceeded => "depth_exceeded",
            Reason::StageLimitExceeded => "stage_limit_exceeded",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SandboxError {
    /// Deny-listed construct; the caller is actively blocked.
    #[error("SECURITY: '{operator}' is not permitted ({reason}) at {path}")]
    Security {
        operator: String,
        reason: Reason,
        path: String,
    },

    /// Stage outside the allow-list; support could be added.
    #[error("Unknown stage '{stage}' at {path}")]
    UnknownStage { stage: String, path: String },

    /// Operator outside the allow-list; support could be added.
    #[error("Unknown operator '{operator}' at {path}")]
    UnknownOperator { operator: String, path: String },

    #[error("document exceeds maximum nesting depth of {max} at {path}")]
    DepthExceeded { max: usize, path: String },

    #[error("pipeline has {count} stages, exceeding the maximum of {max} stages")]
    StageLimitExceeded { count: usize, max: usize },

    /// Empty pipeline, non-sequence pipeline, malformed stage.
    #[error("ArgumentError: invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("ArgumentError: invalid constraint document: {0}")]
    InvalidConstraint(String),

    /// The document passed the policy but did not form valid constraints.
    #[error(transparent)]
    Translation(#[from] PlanError),
}

impl SandboxError {
    /// Offending operator or stage, when there is one.
    pub fn operator(&self) -> Option<&str> {
        match self {
            SandboxError::Security { operator, .. } => Some(operator),
            SandboxError::UnknownStage { stage, .. } => Some(stage),
            SandboxError::UnknownOperator { operator, .. } => Some(operator),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<Reason> {
        match self {
            SandboxError::Security { reason, .. } => Some(*reason),
            SandboxError::UnknownStage { .. } | SandboxError::UnknownOperator { .. } => {
                Some(Reason::UnknownOperator)
            }
            SandboxError::DepthExceeded { .. } => Some(Reason::DepthExceeded),
            SandboxError::StageLimitExceeded { .. } => Some(Reason::StageLimitExceeded),
            _ => None,
        }
    }

    /// Deny-list hit, as opposed to "not supported".
    pub fn is_security(&self) -> bool {
        matches!(self, SandboxError::Security { .. })
    }
}
