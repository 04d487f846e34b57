//! Dashboard configuration

use anyhow::{Context, Result};
use karpx_lib::compat::{DEFAULT_RELEASES_URL, DEFAULT_RELEASE_TIMEOUT};
use karpx_lib::status::{DEFAULT_MAX_IN_FLIGHT, DEFAULT_VERSION_TIMEOUT};
use karpx_lib::InspectorConfig;
use serde::Deserialize;
use std::time::Duration;

/// Dashboard configuration, read from `KARPX_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Listen address; loopback unless explicitly exposed
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Restrict the dashboard to a single kubeconfig context
    #[serde(default)]
    pub context: Option<String>,

    /// Explicit kubeconfig path instead of `$KUBECONFIG` / `~/.kube/config`
    #[serde(default)]
    pub kubeconfig: Option<String>,

    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default = "default_version_timeout_ms")]
    pub version_timeout_ms: u64,

    #[serde(default = "default_release_timeout_ms")]
    pub release_timeout_ms: u64,

    /// Release index endpoint
    #[serde(default = "default_releases_url")]
    pub releases_url: String,
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_version_timeout_ms() -> u64 {
    DEFAULT_VERSION_TIMEOUT.as_millis() as u64
}

fn default_release_timeout_ms() -> u64 {
    DEFAULT_RELEASE_TIMEOUT.as_millis() as u64
}

fn default_releases_url() -> String {
    DEFAULT_RELEASES_URL.to_string()
}

impl DashboardConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("KARPX"))
    }

    /// Load configuration from an environment source
    pub fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment)
            .build()
            .context("read dashboard configuration")?;

        let dashboard: DashboardConfig = config
            .try_deserialize()
            .context("invalid dashboard configuration")?;
        Ok(dashboard.normalized())
    }

    fn normalized(mut self) -> Self {
        self.context = self.context.filter(|c| !c.trim().is_empty());
        self.kubeconfig = self.kubeconfig.filter(|k| !k.trim().is_empty());
        self.max_in_flight = self.max_in_flight.max(1);
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn inspector_config(&self) -> InspectorConfig {
        InspectorConfig {
            max_in_flight: self.max_in_flight,
            version_timeout: Duration::from_millis(self.version_timeout_ms),
        }
    }

    pub fn release_timeout(&self) -> Duration {
        Duration::from_millis(self.release_timeout_ms)
    }
}
