//! CLI command implementations

pub mod clusters;
pub mod compat;
pub mod nodes;

use crate::config::Config;
use crate::output::OutputFormat;
use anyhow::{Context, Result};
use karpx_lib::compat::DEFAULT_RELEASE_TIMEOUT;
use karpx_lib::status::DEFAULT_MAX_IN_FLIGHT;
use karpx_lib::{CompatMatrix, GithubReleases, Inspector, InspectorConfig, KubeClusterSource, Resolver};
use std::sync::Arc;

/// Settings shared by every command
pub struct App {
    pub format: OutputFormat,
    pub config: Config,
    pub kubeconfig: Option<String>,
    /// Context from `--context`, falling back to the configured default
    pub context: Option<String>,
    pub releases_url: String,
}

impl App {
    /// Cluster source over the selected kubeconfig
    pub fn source(&self) -> Arc<KubeClusterSource> {
        Arc::new(match &self.kubeconfig {
            Some(path) => KubeClusterSource::with_kubeconfig(path),
            None => KubeClusterSource::new(),
        })
    }

    /// Context for single-cluster commands: `--context`, the configured
    /// default, or the kubeconfig's current context
    pub fn resolve_context(&self, source: &KubeClusterSource) -> Result<String> {
        match &self.context {
            Some(context) => Ok(context.clone()),
            None => source
                .current_context()
                .context("No --context given and the kubeconfig has no current context"),
        }
    }

    pub fn resolver(&self) -> Result<Resolver> {
        let releases = GithubReleases::with_url(&self.releases_url, DEFAULT_RELEASE_TIMEOUT)
            .context("Failed to create release index client")?;
        Ok(Resolver::new(Arc::new(CompatMatrix::builtin()), Arc::new(releases)))
    }

    pub fn inspector(&self, source: Arc<KubeClusterSource>) -> Result<Inspector> {
        let config = InspectorConfig {
            max_in_flight: self.config.max_in_flight.unwrap_or(DEFAULT_MAX_IN_FLIGHT).max(1),
            ..Default::default()
        };
        Ok(Inspector::new(source, self.resolver()?, config))
    }
}

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be installed.
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
