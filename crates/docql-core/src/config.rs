//! Compiler configuration that downstream crates can serialize/deserialize.
//!
//! There is no process-wide mutable state: executors take a `CompilerConfig`
//! at construction, and per-call options override it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Ceiling on the total number of stages in a validated pipeline
    /// (including `$facet` sub-pipelines).
    pub max_pipeline_stages: usize,

    /// Ceiling on recursive nesting depth of any validated document.
    pub max_depth: usize,

    /// Pipeline executions allowed per caller per window.
    pub rate_limit: u32,

    /// Rate-limit window length in seconds.
    pub rate_window_secs: u64,

    /// Whether query results are cached when neither the query nor the call says otherwise.
    pub cache_by_default: bool,

    /// Run builder-emitted pipelines through the sandbox as well as agent ones.
    pub validate_trusted_pipelines: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_pipeline_stages: 20,
            max_depth: 10,
            rate_limit: 60,
            rate_window_secs: 60,
            cache_by_default: true,
            validate_trusted_pipelines: true,
        }
    }
}

impl CompilerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `DOCQL_MAX_PIPELINE_STAGES`: stage-count ceiling
    /// - `DOCQL_MAX_DEPTH`: nesting-depth ceiling
    /// - `DOCQL_RATE_LIMIT`: calls per window per caller
    /// - `DOCQL_RATE_WINDOW_SECS`: window length
    /// - `DOCQL_CACHE_DEFAULT`: `true`/`false`
    /// - `DOCQL_VALIDATE_TRUSTED`: `true`/`false`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse::<usize>("DOCQL_MAX_PIPELINE_STAGES") {
            cfg.max_pipeline_stages = v;
        }
        if let Some(v) = env_parse::<usize>("DOCQL_MAX_DEPTH") {
            cfg.max_depth = v;
        }
        if let Some(v) = env_parse::<u32>("DOCQL_RATE_LIMIT") {
            cfg.rate_limit = v;
        }
        if let Some(v) = env_parse::<u64>("DOCQL_RATE_WINDOW_SECS") {
            cfg.rate_window_secs = v;
        }
        if let Some(v) = env_parse::<bool>("DOCQL_CACHE_DEFAULT") {
            cfg.cache_by_default = v;
        }
        if let Some(v) = env_parse::<bool>("DOCQL_VALIDATE_TRUSTED") {
            cfg.validate_trusted_pipelines = v;
        }

        cfg
    }

    /// Reject configurations the sandbox or limiter cannot honour.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_pipeline_stages == 0 {
            return Err(crate::error::Error::Config(
                "max_pipeline_stages must be at least 1".into(),
            ));
        }
        if self.max_depth == 0 {
            return Err(crate::error::Error::Config(
                "max_depth must be at least 1".into(),
            ));
        }
        if self.rate_window_secs == 0 {
            return Err(crate::error::Error::Config(
                "rate_window_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
