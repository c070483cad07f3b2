//! mcqgen CLI
//!
//! Usage:
//!   mcqgen run [-c configs/config.yaml] [key=value ...]
//!   mcqgen check [-c configs/config.yaml] [key=value ...]
//!   mcqgen repair output.json [-o repaired.json]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mcqgen_core::{LabTestMapping, RunConfig};
use mcqgen_runtime::{
    missing_record_stores, provider_config, repair_fragments, BatchRunner, ProviderRegistry,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mcqgen")]
#[command(about = "Generate diagnostic multiple-choice questions from admission records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate questions for every configured pathology
    Run {
        /// Run configuration (YAML)
        #[arg(short, long, default_value = "configs/config.yaml")]
        config: PathBuf,

        /// Dotted overrides, e.g. order=l include_ref_range=true
        overrides: Vec<String>,
    },

    /// Validate configuration, inputs and provider settings without calling the LLM
    Check {
        /// Run configuration (YAML)
        #[arg(short, long, default_value = "configs/config.yaml")]
        config: PathBuf,

        /// Dotted overrides, e.g. llm.model=gpt-4o-mini
        overrides: Vec<String>,
    },

    /// Join a legacy fragment output file into one JSON array
    Repair {
        /// Legacy output file
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { config, overrides } => run(config, overrides).await,
        Commands::Check { config, overrides } => check(config, overrides).await,
        Commands::Repair { input, output } => repair(input, output),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "mcqgen=debug" } else { "mcqgen=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path, overrides: &[String]) -> Result<RunConfig> {
    RunConfig::load(path, overrides)
        .with_context(|| format!("Failed to load config: {}", path.display()))
}

async fn run(config_path: PathBuf, overrides: Vec<String>) -> Result<()> {
    let config = load_config(&config_path, &overrides)?;
    let output = config.output_path.clone();
    info!(
        config = %config_path.display(),
        overrides = overrides.len(),
        output = %output.display(),
        format = ?config.output_format,
        "Loaded run config"
    );

    let registry = ProviderRegistry::with_defaults();
    let mut runner = BatchRunner::new(config, &registry).context("Failed to prepare run")?;
    let summary = runner.run().await.context("Run aborted")?;
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        output = %output.display(),
        "Output written"
    );

    println!(
        "{} generated, {} failed, {} skipped -> {}",
        summary.succeeded,
        summary.failed,
        summary.composition_failures + summary.missing_records,
        output.display()
    );
    if !summary.invalid_indices.is_empty() {
        println!("Failed call indices: {:?}", summary.invalid_indices);
    }

    Ok(())
}

async fn check(config_path: PathBuf, overrides: Vec<String>) -> Result<()> {
    let config = load_config(&config_path, &overrides)?;

    LabTestMapping::from_json_file(&config.lab_test_mapping_path).with_context(|| {
        format!(
            "Failed to load lab test mapping: {}",
            config.lab_test_mapping_path.display()
        )
    })?;

    let missing = missing_record_stores(&config);
    if !missing.is_empty() {
        let paths: Vec<_> = missing.iter().map(|p| p.display().to_string()).collect();
        bail!("Missing record stores: {}", paths.join(", "));
    }

    let registry = ProviderRegistry::with_defaults();
    let settings = provider_config(&config.llm);
    registry
        .validate(&config.llm.provider, &settings)
        .context("Invalid provider settings")?;
    let provider = registry
        .create(&config.llm.provider, &settings)
        .context("Failed to create provider")?;
    if !provider.health_check().await {
        bail!("Provider '{}' failed its health check", provider.name());
    }

    println!(
        "OK: {} pathologies, order '{}', provider {} ({})",
        config.pathologies.len(),
        config.order,
        provider.name(),
        config.llm.model
    );
    Ok(())
}

fn repair(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let contents = fs::read_to_string(&input)
        .with_context(|| format!("Failed to read: {}", input.display()))?;
    let replies = repair_fragments(&contents)
        .with_context(|| format!("Not a legacy fragment file: {}", input.display()))?;
    let json = serde_json::to_string_pretty(&replies)?;
    info!(input = %input.display(), replies = replies.len(), "Repaired legacy output");

    match output {
        Some(path) => {
            fs::write(&path, json)
                .with_context(|| format!("Failed to write: {}", path.display()))?;
            eprintln!("Wrote {} replies to {}", replies.len(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
