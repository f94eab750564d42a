//! Executor: compile a query and hand it to the transport.
//!
//! Per request:
//! - compile (find vs. aggregate is the query's decision),
//! - serve from the query's result cache when caching is on, it is warm,
//!   and it was filled in the same master-key mode,
//! - for pipelines: throttle untrusted agents, then run the sandbox,
//! - call the transport and stamp a `CompileManifest`.
//!
//! Cache precedence: `ExecOptions::cache` > `Query::use_cache` >
//! `CompilerConfig::cache_by_default`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use docql_core::config::CompilerConfig;
use docql_core::document::{Pipeline, Transport};
use docql_core::hash::fingerprint_request;
use docql_core::id::RequestId;
use docql_core::manifest::{CompileManifest, RequestKind};
use docql_limit::RateLimiter;
use docql_operators::Registry;
use docql_planner::{Compiled, PlanError, Query};
use docql_sandbox::{ConstraintTranslator, PipelineValidator, SandboxError};
use serde_json::Value as Json;
use thiserror::Error;

use crate::metrics::emit_span;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    RateLimit(#[from] docql_limit::Error),
    #[error(transparent)]
    Core(#[from] docql_core::error::Error),
}

/// Who is submitting the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// In-process code building queries through the typed API.
    Trusted,
    /// External caller (user or agent), keyed for rate limiting.
    Agent(String),
}

/// Per-call overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    pub cache: Option<bool>,
    pub master_key: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Execution {
    pub records: Vec<Json>,
    pub manifest: CompileManifest,
    /// Served from the query's result cache without a transport call.
    pub from_cache: bool,
}

pub struct Executor {
    cfg: CompilerConfig,
    registry: Arc<Registry>,
    validator: PipelineValidator,
    translator: ConstraintTranslator,
    limiter: Arc<RateLimiter>,
    transport: Arc<dyn Transport>,
    next_request: AtomicU64,
}

impl Executor {
    pub fn new(cfg: CompilerConfig, transport: Arc<dyn Transport>) -> Result<Self, ExecError> {
        cfg.validate()?;
        let limiter = Arc::new(RateLimiter::from_config(&cfg)?);
        Ok(Self {
            validator: PipelineValidator::from_config(&cfg),
            translator: ConstraintTranslator::from_config(&cfg),
            registry: Arc::new(Registry::standard()),
            limiter,
            transport,
            next_request: AtomicU64::new(1),
            cfg,
        })
    }

    /// Share one limiter across executors so a caller's budget is global.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.cfg
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn execute(
        &self,
        query: &mut Query,
        source: Source,
        opts: ExecOptions,
    ) -> Result<Execution, ExecError> {
        let started = Instant::now();
        let compiled = query.compile_with(&self.registry)?;
        let manifest = self.manifest(&compiled)?;

        let cache = opts
            .cache
            .or(query.cache_preference())
            .unwrap_or(self.cfg.cache_by_default);
        let master = opts.master_key.unwrap_or(query.master_key());
        if cache {
            if let Some(hit) = query.cached_results_for(master) {
                return Ok(Execution {
                    records: hit.to_vec(),
                    manifest,
                    from_cache: true,
                });
            }
        }

        let transport = query
            .client()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.transport));

        let records = match &compiled {
            Compiled::Find(request) => transport.find(request, master)?,
            Compiled::Aggregate { table, pipeline } => {
                self.admit_pipeline(&source, pipeline)?;
                transport.aggregate(table, pipeline, master)?
            }
        };

        if cache {
            query.store_results_with(records.clone(), master);
        }
        self.record(&manifest, records.len(), started);
        Ok(Execution {
            records,
            manifest,
            from_cache: false,
        })
    }

    /// Run a raw pipeline supplied by an external caller.
    ///
    /// The caller is charged before validation, so rejected submissions
    /// still count against the window.
    pub fn execute_agent_pipeline(
        &self,
        caller: &str,
        table: &str,
        raw: &Json,
    ) -> Result<Execution, ExecError> {
        let started = Instant::now();
        self.limiter.check(caller)?;
        self.validator.validate(raw)?;
        let pipeline = Pipeline::from_json(raw)?;

        let manifest = CompileManifest::new(
            self.next_request(),
            table,
            RequestKind::Aggregate,
            fingerprint_request(table, raw)?,
            now_ms(),
        )
        .with_stage_count(pipeline.len());

        let records = self.transport.aggregate(table, &pipeline, false)?;
        self.record(&manifest, records.len(), started);
        Ok(Execution {
            records,
            manifest,
            from_cache: false,
        })
    }

    /// Build a query on `table` from an external constraint document.
    pub fn agent_query(&self, table: &str, constraints: &Json) -> Result<Query, ExecError> {
        let clauses = self.translator.translate(constraints)?;
        let mut query = Query::new(table);
        query.where_all(clauses);
        Ok(query)
    }

    fn admit_pipeline(&self, source: &Source, pipeline: &Pipeline) -> Result<(), ExecError> {
        match source {
            Source::Agent(caller) => {
                self.limiter.check(caller)?;
                self.validator.validate_pipeline(pipeline)?;
            }
            Source::Trusted if self.cfg.validate_trusted_pipelines => {
                self.validator.validate_pipeline(pipeline)?;
            }
            Source::Trusted => {}
        }
        Ok(())
    }

    fn manifest(&self, compiled: &Compiled) -> Result<CompileManifest, ExecError> {
        Ok(CompileManifest::new(
            self.next_request(),
            compiled.table(),
            compiled.kind(),
            compiled.fingerprint()?,
            now_ms(),
        )
        .with_stage_count(compiled.stage_count()))
    }

    fn next_request(&self) -> RequestId {
        RequestId::new(self.next_request.fetch_add(1, Ordering::Relaxed))
    }

    fn record(&self, manifest: &CompileManifest, records: usize, started: Instant) {
        emit_span(
            "execute",
            &[
                ("table", manifest.table.clone()),
                ("kind", format!("{:?}", manifest.kind)),
                ("fingerprint", manifest.fingerprint.short()),
                ("stages", manifest.stage_count.to_string()),
                ("records", records.to_string()),
                ("elapsed_us", started.elapsed().as_micros().to_string()),
            ],
        );
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
