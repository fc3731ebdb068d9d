//! Kube Assistant - command-line entry point
//!
//! ## Usage
//!
//! ```bash
//! # Ask a question
//! kube-assistant query "show logs for backend pod"
//!
//! # Full response envelope as JSON
//! kube-assistant query "pods in kube-system" --json
//!
//! # Use the REST API instead of kubectl, without an LLM
//! kube-assistant --backend api --no-llm query "list deployments"
//!
//! # Cluster and service health
//! kube-assistant health
//!
//! # Environment variables
//! KUBE_ASSISTANT_LOG_LEVEL=debug KUBE_ASSISTANT_MODEL=llama3.1 kube-assistant query "list nodes"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use kube_assistant::config::{AssistantConfig, BackendKind};
use kube_assistant::orchestration::{QueryOrchestrator, QueryProcessor, QueryResponse};

/// Kube Assistant - ask a Kubernetes cluster questions in plain language
///
/// Only read-only operations (list, get, describe, logs) are ever run.
#[derive(Parser)]
#[command(name = "kube-assistant")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Natural-language, read-only Kubernetes queries")]
#[command(long_about = r#"
Natural-language, read-only queries against a Kubernetes cluster.

Queries are checked against a static security policy, parsed into a
structured intent (LLM first, keyword heuristics as fallback), matched
against live resource names and executed through kubectl or the REST API.

Configuration can be provided via:
1. Configuration file (TOML format)
2. Command-line arguments (override config file)
3. Environment variables (KUBE_ASSISTANT_* prefix)

Environment Variables:
  KUBE_ASSISTANT_CONFIG        Configuration file path
  KUBE_ASSISTANT_LOG_LEVEL     Log level (trace, debug, info, warn, error)
  KUBE_ASSISTANT_BACKEND       Cluster backend (kubectl, api)
  KUBE_ASSISTANT_LLM_ENDPOINT  Completion endpoint URL
  KUBE_ASSISTANT_MODEL         Model name
  KUBE_ASSISTANT_NO_LLM        Disable the LLM entirely
  KUBE_ASSISTANT_NAMESPACE     Default namespace
"#)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "kube-assistant.toml", env = "KUBE_ASSISTANT_CONFIG")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "KUBE_ASSISTANT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Cluster backend (kubectl, api)
    #[arg(short, long, env = "KUBE_ASSISTANT_BACKEND")]
    backend: Option<String>,

    /// LLM completion endpoint
    #[arg(long, env = "KUBE_ASSISTANT_LLM_ENDPOINT")]
    llm_endpoint: Option<String>,

    /// LLM model name
    #[arg(short, long, env = "KUBE_ASSISTANT_MODEL")]
    model: Option<String>,

    /// Skip the LLM; parse with keyword heuristics and return raw output
    #[arg(long, env = "KUBE_ASSISTANT_NO_LLM")]
    no_llm: bool,

    /// Namespace used when a query does not name one
    #[arg(short, long, env = "KUBE_ASSISTANT_NAMESPACE")]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single query
    Query {
        /// The question, e.g. "pods in kube-system"
        text: String,

        /// Print the full response envelope as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check service and cluster health
    Health,

    /// Generate a default configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "kube-assistant.toml")]
        output: String,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file to validate
        #[arg(short, long, default_value = "kube-assistant.toml")]
        config: String,
    },

    /// Show version and environment information
    Info,
}

/// Load configuration with CLI and environment overrides
fn load_config_with_env(cli: &Cli) -> anyhow::Result<AssistantConfig> {
    let mut config = AssistantConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;

    if let Some(ref level) = cli.log_level {
        config.log_level = level.clone();
    }

    if let Some(ref backend) = cli.backend {
        config.cluster.backend = backend.parse::<BackendKind>()?;
    }

    if let Some(ref endpoint) = cli.llm_endpoint {
        config.llm.endpoint = endpoint.clone();
    }

    if let Some(ref model) = cli.model {
        config.llm.model = model.clone();
    }

    if cli.no_llm {
        config.llm.enabled = false;
    }

    if let Some(ref namespace) = cli.namespace {
        config.cluster.default_namespace = namespace.clone();
    }

    Ok(config)
}

/// Initialize logging with the specified level
fn init_logging(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Generate a default configuration file
fn generate_config(output: &str) -> anyhow::Result<()> {
    let config = AssistantConfig::default();
    config.save(output)?;
    println!("Generated configuration file: {}", output);
    println!("Backend: {:?}", config.cluster.backend);
    println!("LLM: {} at {}", config.llm.model, config.llm.endpoint);
    Ok(())
}

/// Validate a configuration file
fn validate_config(config_path: &str) -> anyhow::Result<()> {
    let config = AssistantConfig::load(config_path)?;
    config.validate()?;
    println!("Configuration is valid!");
    println!("  Backend: {:?}", config.cluster.backend);
    println!("  Default namespace: {}", config.cluster.default_namespace);
    println!("  LLM enabled: {}", config.llm.enabled);
    println!("  LLM model: {}", config.llm.model);
    println!("  Execute timeout: {}s", config.pipeline.execute_timeout_secs);
    Ok(())
}

fn show_info() {
    println!("Kube Assistant v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Build Information:");
    println!("  Package: {}", env!("CARGO_PKG_NAME"));
    println!("  Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Environment Variables:");
    println!("  KUBE_ASSISTANT_CONFIG       - Configuration file path");
    println!("  KUBE_ASSISTANT_LOG_LEVEL    - Log level");
    println!("  KUBE_ASSISTANT_BACKEND      - Cluster backend");
    println!("  KUBE_ASSISTANT_LLM_ENDPOINT - Completion endpoint");
    println!("  KUBE_ASSISTANT_MODEL        - Model name");
    println!("  KUBE_ASSISTANT_NO_LLM       - Disable the LLM");
    println!("  KUBE_ASSISTANT_NAMESPACE    - Default namespace");
}

fn print_response(response: &QueryResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    if let Some(intent) = &response.parsed_intent {
        if let (Some(from), Some(name)) = (&intent.resolved_from, &intent.resource_name) {
            println!("(resolved '{}' to '{}')", from, name);
        }
        if let Some(note) = &intent.resolution_note {
            println!("({})", note);
        }
    }
    if let Some(text) = &response.enhanced_response {
        println!("{}", text);
    }
    if let Some(err) = &response.error {
        eprintln!("{}", err);
    }
    if let Some(suggestion) = &response.suggestion {
        eprintln!("Suggestion: {}", suggestion);
    }
    Ok(())
}

/// Run one query; Ctrl+C abandons it
async fn run_query(config: &AssistantConfig, text: &str, json: bool) -> anyhow::Result<()> {
    let orchestrator = QueryOrchestrator::from_config(config)?;

    let response = orchestrator
        .process_query_until(text, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received interrupt signal");
        })
        .await;

    match response {
        Some(response) => {
            print_response(&response, json)?;
            if !response.success {
                anyhow::bail!("Query was not processed");
            }
            Ok(())
        }
        None => anyhow::bail!("Query cancelled"),
    }
}

async fn run_health(config: &AssistantConfig) -> anyhow::Result<()> {
    let orchestrator = QueryOrchestrator::from_config(config)?;
    let health = orchestrator.health_check().await;
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Init { output } => return generate_config(output),
        Commands::Validate { config } => return validate_config(config),
        Commands::Info => {
            show_info();
            return Ok(());
        }
        Commands::Query { .. } | Commands::Health => {}
    }

    let config = load_config_with_env(&cli)?;
    init_logging(&config.log_level);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("Configuration error: {}", e);
        eprintln!("Use 'kube-assistant init' to generate a default configuration file.");
        return Err(e);
    }

    match &cli.command {
        Commands::Query { text, json } => run_query(&config, text, *json).await,
        Commands::Health => run_health(&config).await,
        _ => Ok(()),
    }
}
