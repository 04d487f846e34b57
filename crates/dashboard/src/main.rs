//! karpx dashboard - Karpenter status across kubeconfig contexts
//!
//! Serves `/api/clusters` (JSON status of every cluster), `/healthz` and
//! `/metrics`.

use anyhow::{Context, Result};
use karpx_dashboard::{
    api::{self, AppState, ContextSelection},
    config::DashboardConfig,
};
use karpx_lib::{CompatMatrix, GithubReleases, Inspector, KubeClusterSource, Resolver};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting karpx dashboard");

    let config = DashboardConfig::load()?;

    let source = Arc::new(match &config.kubeconfig {
        Some(path) => KubeClusterSource::with_kubeconfig(path),
        None => KubeClusterSource::new(),
    });
    let releases = GithubReleases::with_url(&config.releases_url, config.release_timeout())
        .context("create release index client")?;
    let resolver = Resolver::new(Arc::new(CompatMatrix::builtin()), Arc::new(releases));
    let inspector = Inspector::new(source.clone(), resolver, config.inspector_config());

    let contexts = match &config.context {
        Some(context) => {
            info!(context = %context, "Dashboard restricted to one context");
            ContextSelection::Fixed(vec![context.clone()])
        }
        None => ContextSelection::Kubeconfig(source),
    };

    let state = Arc::new(AppState::new(inspector, contexts));

    let signal_state = state.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
        signal_state.shutdown();
    };

    api::serve(&config.bind_addr(), state, shutdown).await
}
