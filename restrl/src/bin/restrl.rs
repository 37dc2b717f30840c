//! restrl CLI.
//!
//! Loads a normalized operation catalog, builds the dependency graph, runs
//! the learning loop against the API under test for the configured
//! duration, and writes the success report.
//!
//! Usage:
//!   restrl --catalog <catalog.json> --api-url <URL> [--config <run.toml>]

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use restrl::catalog::OperationCatalog;
use restrl::config::RunConfig;
use restrl::graph::{LexicalComparator, OperationGraph};
use restrl::orchestrator::Orchestrator;
use restrl::synth::{
    CachedClient, CostMeter, LlmValueSynthesizer, OpenAiClient, TypedValueSynthesizer,
    ValueSynthesizer,
};
use restrl::transport::ReqwestTransport;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "restrl")]
#[command(about = "Reinforcement-learning test generation for REST APIs")]
struct Args {
    /// Path to the normalized operation catalog (JSON)
    #[arg(long, env = "RESTRL_CATALOG")]
    catalog: PathBuf,

    /// Path to the run configuration file (TOML format)
    #[arg(long, env = "RESTRL_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Base URL of the API under test (overrides the config file)
    #[arg(long, env = "RESTRL_API_URL")]
    api_url: Option<String>,

    /// Run duration in seconds (overrides the config file)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Seed for the run's random source (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Disable language-model value synthesis for this run
    #[arg(long, default_value = "false")]
    no_llm: bool,

    /// Print the dependency graph and exit
    #[arg(long, default_value = "false")]
    describe_graph: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let mut config = RunConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
    }
    if let Some(duration) = args.duration_secs {
        config.time_duration_secs = duration;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    let catalog = OperationCatalog::from_json_file(&args.catalog)
        .with_context(|| format!("loading catalog from {}", args.catalog.display()))?;
    config.spec_name = catalog.spec_name.clone();
    info!(
        spec = %catalog.spec_name,
        operations = catalog.operations.len(),
        "catalog loaded"
    );

    let comparator =
        LexicalComparator::new(config.similarity_threshold, config.runner_up_count);
    let mut graph = OperationGraph::new(catalog, config.tentative_edge_limit);
    graph.build_dependencies(&comparator)?;

    if args.describe_graph {
        println!("{}", graph.describe());
        return Ok(());
    }

    let meter = Arc::new(CostMeter::default());
    let synthesizer: Arc<dyn ValueSynthesizer> = if config.llm.enabled && !args.no_llm {
        let client = OpenAiClient::new(config.llm.clone(), meter.clone())
            .context("initializing LLM client")?;
        let salt = format!(
            "{}|{}|{}",
            config.llm.model, config.llm.temperature, config.llm.max_tokens
        );
        Arc::new(LlmValueSynthesizer::new(Box::new(CachedClient::new(
            Box::new(client),
            &salt,
        ))))
    } else {
        Arc::new(TypedValueSynthesizer)
    };

    let transport = ReqwestTransport::new(
        &config.api_url,
        Duration::from_secs(config.request_timeout_secs),
    )
    .map_err(anyhow::Error::msg)?;

    info!(
        api_url = %config.api_url,
        duration_secs = config.time_duration_secs,
        mutation_rate = config.mutation_rate,
        "starting run"
    );
    let cost_per_token = config.llm.cost_per_token_usd;
    let mut orchestrator =
        Orchestrator::new(graph, config, Box::new(transport), synthesizer);
    let summary = orchestrator.run()?;

    info!(
        finished_at = %Utc::now().to_rfc3339(),
        iterations = summary.iterations,
        server_errors = summary.server_errors,
        responses = %summary.status_summary,
        report = %summary.report_path.display(),
        llm_tokens = meter.total_tokens(),
        llm_cost_usd = meter.cost_usd(cost_per_token),
        "run complete"
    );
    Ok(())
}
