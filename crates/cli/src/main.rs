//! karpx CLI
//!
//! Checks Karpenter compatibility, inspects clusters and recommends
//! node pool shapes from the command line.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{clusters, compat, nodes, App};
use karpx_lib::compat::DEFAULT_RELEASES_URL;
use karpx_lib::OptimizationMode;
use tracing_subscriber::EnvFilter;

/// Karpenter decision engine
#[derive(Parser)]
#[command(name = "karpx")]
#[command(author, version, about = "Karpenter compatibility, status and node pool recommendations", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context for single-cluster commands
    #[arg(long, env = "KARPX_CONTEXT")]
    pub context: Option<String>,

    /// Karpenter release index URL
    #[arg(long, env = "KARPX_RELEASES_URL", default_value = DEFAULT_RELEASES_URL, value_parser = parse_url)]
    pub releases_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect provider, Kubernetes version and Karpenter on one cluster
    Detect,

    /// Show Karpenter status across clusters
    Status {
        /// Contexts to inspect (repeatable, defaults to the top-level context, else every kubeconfig context)
        #[arg(long = "context")]
        contexts: Vec<String>,
    },

    /// Check a Karpenter version against a Kubernetes version, offline
    Compat {
        /// Karpenter controller version
        controller: String,

        /// Kubernetes cluster version
        cluster: String,
    },

    /// List released Karpenter versions compatible with a Kubernetes version
    Versions {
        /// Kubernetes cluster version
        cluster: String,
    },

    /// Recommend a node pool for the workloads running on one cluster
    Nodes {
        /// Cloud provider (aws, azure, gcp); detected when omitted
        #[arg(long)]
        provider: Option<String>,

        /// Optimization mode (cost, balanced, performance)
        #[arg(long)]
        mode: Option<OptimizationMode>,
    },
}

fn parse_url(value: &str) -> Result<String, String> {
    url::Url::parse(value)
        .map(|_| value.to_string())
        .map_err(|e| format!("invalid URL: {e}"))
}

fn init_tracing(verbose: bool) {
    let directives = if verbose { "karpx_lib=debug,karpx=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives)))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let context = cli.context.or_else(|| config.default_context.clone());

    let app = App {
        format: cli.format,
        config,
        kubeconfig: cli.kubeconfig,
        context,
        releases_url: cli.releases_url,
    };

    match cli.command {
        Commands::Detect => clusters::detect(&app).await,
        Commands::Status { contexts } => clusters::status(&app, contexts).await,
        Commands::Compat { controller, cluster } => compat::compat(&app, &controller, &cluster),
        Commands::Versions { cluster } => compat::versions(&app, &cluster).await,
        Commands::Nodes { provider, mode } => nodes::nodes(&app, provider, mode).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
