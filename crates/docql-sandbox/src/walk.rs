//! Recursive walk shared by both validators.
//!
//! Depth counts containers: a stage (or a constraint document) is depth 1,
//! each nested object or array adds one. Scalars never add depth.
//! Sub-pipelines are only recognised where a stage defines them: `$facet`
//! branches and the `pipeline` key of a `$lookup` payload.

use serde_json::{Map, Value as Json};

use crate::error::{Reason, Result, SandboxError};
use crate::policy::SandboxPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Pipeline,
    Constraint,
}

pub(crate) struct Walker<'p> {
    policy: &'p SandboxPolicy,
    mode: Mode,
    path: Vec<String>,
}

impl<'p> Walker<'p> {
    pub(crate) fn new(policy: &'p SandboxPolicy, mode: Mode) -> Self {
        Self {
            policy,
            mode,
            path: Vec::new(),
        }
    }

    fn path(&self) -> String {
        if self.path.is_empty() {
            return "<root>".to_string();
        }
        let mut out = String::new();
        for seg in &self.path {
            if !seg.starts_with('[') && !out.is_empty() {
                out.push('.');
            }
            out.push_str(seg);
        }
        out
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.policy.max_depth {
            return Err(SandboxError::DepthExceeded {
                max: self.policy.max_depth,
                path: self.path(),
            });
        }
        Ok(())
    }

    fn denied(&self, key: &str) -> bool {
        match self.mode {
            Mode::Pipeline => self.policy.is_denied(key),
            Mode::Constraint => self.policy.is_denied_in_constraint(key),
        }
    }

    fn security(&self, key: &str) -> SandboxError {
        SandboxError::Security {
            operator: key.to_string(),
            reason: Reason::CodeExecution,
            path: self.path(),
        }
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if !key.starts_with('$') {
            return Ok(());
        }
        if self.denied(key) {
            return Err(self.security(key));
        }
        let allowed = match self.mode {
            Mode::Pipeline => self.policy.allowed_pipeline_operators.contains(key),
            Mode::Constraint => self.policy.allowed_constraint_operators.contains(key),
        };
        if allowed {
            Ok(())
        } else {
            Err(SandboxError::UnknownOperator {
                operator: key.to_string(),
                path: self.path(),
            })
        }
    }

    /// Walk any document value.
    pub(crate) fn walk(&mut self, value: &Json, depth: usize) -> Result<()> {
        match value {
            Json::Object(map) => {
                self.check_depth(depth)?;
                self.walk_object(map, depth)
            }
            Json::Array(items) => {
                self.check_depth(depth)?;
                for (i, item) in items.iter().enumerate() {
                    self.path.push(format!("[{}]", i));
                    self.walk(item, depth + 1)?;
                    self.path.pop();
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn walk_object(&mut self, map: &Map<String, Json>, depth: usize) -> Result<()> {
        // Deny-list first so a blocked key is never reported as merely unknown.
        if let Some(bad) = map.keys().find(|k| self.denied(k)) {
            return Err(self.security(bad));
        }
        if self.mode == Mode::Pipeline && is_date_envelope(map) {
            return Ok(());
        }
        for (key, value) in map {
            self.check_key(key)?;
            self.path.push(key.clone());
            self.walk(value, depth + 1)?;
            self.path.pop();
        }
        Ok(())
    }

    /// `$lookup` payload at `depth`; only its `pipeline` key nests stages.
    fn lookup(&mut self, spec: &Map<String, Json>, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        if let Some(bad) = spec.keys().find(|k| self.denied(k)) {
            return Err(self.security(bad));
        }
        for (key, value) in spec {
            self.check_key(key)?;
            self.path.push(key.clone());
            match (key.as_str(), value) {
                ("pipeline", Json::Array(stages)) => {
                    self.check_depth(depth + 1)?;
                    self.stages(stages, depth + 2)?;
                }
                _ => self.walk(value, depth + 1)?,
            }
            self.path.pop();
        }
        Ok(())
    }

    /// Walk a stage list whose stage documents sit at `depth`.
    pub(crate) fn stages(&mut self, stages: &[Json], depth: usize) -> Result<()> {
        for (i, stage) in stages.iter().enumerate() {
            self.path.push(format!("[{}]", i));
            self.stage(stage, depth)?;
            self.path.pop();
        }
        Ok(())
    }

    fn stage(&mut self, stage: &Json, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        let map = stage.as_object().ok_or_else(|| {
            SandboxError::InvalidPipeline(format!("stage at {} is not an object", self.path()))
        })?;
        if let Some(bad) = map.keys().find(|k| self.policy.is_denied(k)) {
            return Err(self.security(bad));
        }
        let mut entries = map.iter();
        let (name, payload) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(SandboxError::InvalidPipeline(format!(
                    "stage at {} must have exactly one operator",
                    self.path()
                )))
            }
        };
        if !self.policy.allowed_stages.contains(name) {
            return Err(SandboxError::UnknownStage {
                stage: name.clone(),
                path: self.path(),
            });
        }
        self.path.push(name.clone());
        if name == "$facet" {
            let facets = payload.as_object().ok_or_else(|| {
                SandboxError::InvalidPipeline(format!("$facet at {} must be an object", self.path()))
            })?;
            self.check_depth(depth + 1)?;
            for (facet, sub) in facets {
                self.path.push(facet.clone());
                let sub = sub.as_array().ok_or_else(|| {
                    SandboxError::InvalidPipeline(format!(
                        "facet at {} must be a stage array",
                        self.path()
                    ))
                })?;
                self.check_depth(depth + 2)?;
                self.stages(sub, depth + 3)?;
                self.path.pop();
            }
        } else if let ("$lookup", Json::Object(spec)) = (name.as_str(), payload) {
            self.lookup(spec, depth + 1)?;
        } else {
            self.walk(payload, depth + 1)?;
        }
        self.path.pop();
        Ok(())
    }
}

/// `{"$date": "<iso>"}` is how storage encodes a date value, not an operator.
fn is_date_envelope(map: &Map<String, Json>) -> bool {
    map.len() == 1 && matches!(map.get("$date"), Some(Json::String(_)))
}

/// Total stages including `$facet` branches and `$lookup` sub-pipelines.
///
/// Recursion stops past `max_nesting`; the depth check reports that case.
pub(crate) fn count_stages(stages: &[Json], max_nesting: usize) -> usize {
    fn go(stages: &[Json], nesting: usize, max_nesting: usize) -> usize {
        let mut total = stages.len();
        if nesting >= max_nesting {
            return total;
        }
        for stage in stages {
            let Some(map) = stage.as_object() else { continue };
            if let Some(Json::Object(facets)) = map.get("$facet") {
                for sub in facets.values() {
                    if let Json::Array(sub) = sub {
                        total += go(sub, nesting + 1, max_nesting);
                    }
                }
            }
            if let Some(Json::Array(sub)) = map.get("$lookup").and_then(|l| l.get("pipeline")) {
                total += go(sub, nesting + 1, max_nesting);
            }
        }
        total
    }
    go(stages, 0, max_nesting)
}
