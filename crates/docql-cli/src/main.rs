//! docql CLI: compile query files and vet agent-supplied documents.

use clap::{Parser, Subcommand};
use docql_core::config::CompilerConfig;
use docql_planner::{parse_yaml_query, Compiled, Query, QueryConfig};
use docql_sandbox::{ConstraintTranslator, PipelineValidator};
use serde_json::{json, Value as Json};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docql")]
#[command(about = "docql: constraint compiler for document collections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Ceiling overrides shared by every subcommand.
#[derive(clap::Args, Debug, Default, Clone)]
struct Limits {
    /// Maximum total pipeline stages (overrides config)
    #[arg(long)]
    max_stages: Option<usize>,

    /// Maximum document nesting depth (overrides config)
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a YAML query file and print the request body
    Compile {
        /// Path to the query YAML file
        #[arg(short, long)]
        query: PathBuf,

        #[command(flatten)]
        limits: Limits,
    },

    /// Check a JSON aggregation pipeline against the sandbox policy
    Validate {
        /// Path to the pipeline JSON file
        #[arg(short, long)]
        pipeline: PathBuf,

        #[command(flatten)]
        limits: Limits,
    },

    /// Translate a JSON constraint document into a find request
    Translate {
        /// Path to the constraint JSON file
        #[arg(short, long)]
        constraints: PathBuf,

        /// Collection the constraints apply to
        #[arg(short, long)]
        table: String,

        #[command(flatten)]
        limits: Limits,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Compile { query, limits } => compile_query(&query, &limits),
        Commands::Validate { pipeline, limits } => validate_pipeline(&pipeline, &limits),
        Commands::Translate {
            constraints,
            table,
            limits,
        } => translate_constraints(&constraints, &table, &limits),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn compile_query(path: &PathBuf, limits: &Limits) -> Result<(), Box<dyn std::error::Error>> {
    let src = fs::read_to_string(path)?;
    let parsed = parse_yaml_query(&src)?;
    let config = effective_config(Some(&parsed.config), limits)?;

    let compiled = parsed.query.compile()?;
    if let Some(pipeline) = compiled.pipeline() {
        if config.validate_trusted_pipelines {
            PipelineValidator::from_config(&config).validate_pipeline(pipeline)?;
        }
    }
    tracing::info!(
        table = compiled.table(),
        stages = compiled.stage_count(),
        "query compiled"
    );
    println!("{}", serde_json::to_string_pretty(&describe(&compiled)?)?);
    Ok(())
}

fn validate_pipeline(path: &PathBuf, limits: &Limits) -> Result<(), Box<dyn std::error::Error>> {
    let raw: Json = serde_json::from_str(&fs::read_to_string(path)?)?;
    let config = effective_config(None, limits)?;
    PipelineValidator::from_config(&config).validate(&raw)?;
    println!("✓ Pipeline is valid");
    Ok(())
}

fn translate_constraints(
    path: &PathBuf,
    table: &str,
    limits: &Limits,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw: Json = serde_json::from_str(&fs::read_to_string(path)?)?;
    let config = effective_config(None, limits)?;
    let clauses = ConstraintTranslator::from_config(&config).translate(&raw)?;
    let mut query = Query::new(table);
    query.where_all(clauses);
    println!("{}", serde_json::to_string_pretty(&describe(&query.compile()?)?)?);
    Ok(())
}

fn describe(compiled: &Compiled) -> Result<Json, Box<dyn std::error::Error>> {
    Ok(json!({
        "table": compiled.table(),
        "kind": compiled.kind(),
        "fingerprint": compiled.fingerprint()?.to_hex(),
        "body": compiled.to_json()?,
    }))
}

/// env < query file `config:` block < command-line flags.
fn effective_config(
    file: Option<&QueryConfig>,
    limits: &Limits,
) -> Result<CompilerConfig, Box<dyn std::error::Error>> {
    let mut config = CompilerConfig::from_env();
    if let Some(file) = file {
        file.apply_to(&mut config);
    }
    apply_limits(&mut config, limits);
    config.validate()?;
    Ok(config)
}

fn apply_limits(cfg: &mut CompilerConfig, limits: &Limits) {
    if let Some(max) = limits.max_stages {
        cfg.max_pipeline_stages = max;
    }
    if let Some(max) = limits.max_depth {
        cfg.max_depth = max;
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_limits, CompilerConfig, Limits};
    use docql_planner::QueryConfig;

    #[test]
    fn query_config_overrides_defaults() {
        let mut config = CompilerConfig::default();
        let file = QueryConfig {
            max_pipeline_stages: Some(30),
            cache_by_default: Some(false),
            ..Default::default()
        };
        file.apply_to(&mut config);
        assert_eq!(config.max_pipeline_stages, 30);
        assert!(!config.cache_by_default);
        assert_eq!(config.max_depth, 10);
    }

    #[test]
    fn cli_flags_beat_query_config() {
        let mut config = CompilerConfig::default();
        let file = QueryConfig {
            max_pipeline_stages: Some(30),
            max_depth: Some(12),
            ..Default::default()
        };
        file.apply_to(&mut config);
        apply_limits(
            &mut config,
            &Limits {
                max_stages: Some(5),
                max_depth: None,
            },
        );
        assert_eq!(config.max_pipeline_stages, 5);
        assert_eq!(config.max_depth, 12);
    }
}
