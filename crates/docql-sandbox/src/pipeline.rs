//! Validation of user- or agent-supplied aggregation pipelines.

use docql_core::config::CompilerConfig;
use docql_core::document::Pipeline;
use serde_json::Value as Json;

use crate::error::{Result, SandboxError};
use crate::policy::{default_policy, SandboxPolicy};
use crate::walk::{count_stages, Mode, Walker};

/// Checks a raw pipeline against a [`SandboxPolicy`].
///
/// Order of checks:
/// 1. the input is a non-empty array of stages,
/// 2. the total stage count, including `$facet` branches and `$lookup`
///    sub-pipelines, is within `max_stages`,
/// 3. every stage and every nested key is walked: deny-listed constructs
///    are rejected first, then anything outside the allow-list, then
///    anything nested deeper than `max_depth`.
#[derive(Debug, Clone)]
pub struct PipelineValidator {
    policy: SandboxPolicy,
}

impl Default for PipelineValidator {
    fn default() -> Self {
        Self::new(default_policy().clone())
    }
}

impl PipelineValidator {
    pub fn new(policy: SandboxPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(cfg: &CompilerConfig) -> Self {
        Self::new(SandboxPolicy::from_config(cfg))
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    pub fn validate(&self, pipeline: &Json) -> Result<()> {
        let out = self.check(pipeline);
        #[cfg(feature = "tracing")]
        if let Err(e) = &out {
            tracing::warn!(error = %e, security = e.is_security(), "pipeline rejected");
        }
        out
    }

    /// Boolean form of [`validate`](Self::validate). Never fails.
    pub fn is_valid(&self, pipeline: &Json) -> bool {
        self.check(pipeline).is_ok()
    }

    /// Validate a pipeline built in-process.
    pub fn validate_pipeline(&self, pipeline: &Pipeline) -> Result<()> {
        self.validate(&pipeline.to_json())
    }

    fn check(&self, pipeline: &Json) -> Result<()> {
        let stages = match pipeline {
            Json::Array(stages) => stages,
            other => {
                return Err(SandboxError::InvalidPipeline(format!(
                    "expected an array of stages, got {}",
                    json_kind(other)
                )))
            }
        };
        if stages.is_empty() {
            return Err(SandboxError::InvalidPipeline("pipeline is empty".into()));
        }

        let count = count_stages(stages, self.policy.max_depth);
        if count > self.policy.max_stages {
            return Err(SandboxError::StageLimitExceeded {
                count,
                max: self.policy.max_stages,
            });
        }

        Walker::new(&self.policy, Mode::Pipeline).stages(stages, 1)
    }
}

pub(crate) fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_simple_pipeline() {
        let v = PipelineValidator::default();
        let p = json!([
            {"$match": {"status": "active"}},
            {"$group": {"_id": "$owner", "n": {"$sum": 1}}},
            {"$sort": {"n": -1}},
            {"$limit": 10}
        ]);
        assert!(v.validate(&p).is_ok());
    }

    #[test]
    fn stage_with_two_keys_is_malformed() {
        let v = PipelineValidator::default();
        let err = v
            .validate(&json!([{"$match": {}, "$limit": 3}]))
            .unwrap_err();
        assert!(matches!(err, SandboxError::InvalidPipeline(_)));
    }

    #[test]
    fn denied_key_beats_shape_check() {
        let v = PipelineValidator::default();
        let err = v
            .validate(&json!([{"$match": {}, "$out": "x"}]))
            .unwrap_err();
        assert!(err.is_security());
    }

    #[test]
    fn facet_branches_count_toward_limit() {
        let v = PipelineValidator::new(SandboxPolicy::with_limits(4, 10));
        let p = json!([
            {"$facet": {
                "a": [{"$match": {}}, {"$limit": 1}],
                "b": [{"$match": {}}, {"$limit": 1}]
            }}
        ]);
        let err = v.validate(&p).unwrap_err();
        assert!(matches!(err, SandboxError::StageLimitExceeded { count: 5, max: 4 }));
    }
}
