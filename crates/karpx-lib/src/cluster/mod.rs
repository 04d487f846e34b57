//! Cluster identity and the cluster data source boundary
//!
//! The [`ClusterSource`] trait is the only way the decision engine talks to a
//! cluster. It returns raw data (versions, pods, nodes, deployments); all
//! decisions are made by the callers in this crate.

mod controller;
mod kube_source;
mod quantity;

pub use controller::{detect_controller, find_controller, ControllerInstall, DeploymentInfo};
pub use kube_source::KubeClusterSource;
pub use quantity::{parse_cpu_millicores, parse_memory_mib};

use crate::workload::PodRequests;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Errors returned by a cluster data source
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("load kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("context {0:?} not found in kubeconfig")]
    ContextNotFound(String),

    #[error("create kubernetes client: {0}")]
    Client(String),

    #[error("{operation}: {message}")]
    Api { operation: String, message: String },
}

impl SourceError {
    pub fn api(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Infrastructure platform a cluster runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
    Unknown,
}

/// Upstream maturity of the Karpenter integration for a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    Full,
    Preview,
    Experimental,
    Unsupported,
}

impl fmt::Display for SupportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SupportLevel::Full => "full",
            SupportLevel::Preview => "preview",
            SupportLevel::Experimental => "experimental",
            SupportLevel::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Display and support information for a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderMeta {
    pub label: &'static str,
    pub support_level: SupportLevel,
    pub chart_repo: Option<&'static str>,
    pub docs_url: Option<&'static str>,
    pub provider_repo: Option<&'static str>,
}

impl Provider {
    pub const SUPPORTED: [Provider; 3] = [Provider::Aws, Provider::Azure, Provider::Gcp];

    pub fn meta(&self) -> ProviderMeta {
        match self {
            Provider::Aws => ProviderMeta {
                label: "AWS EKS",
                support_level: SupportLevel::Full,
                chart_repo: Some("oci://public.ecr.aws/karpenter/karpenter"),
                docs_url: Some("https://karpenter.sh/docs/getting-started/getting-started-with-karpenter/"),
                provider_repo: Some("https://github.com/aws/karpenter-provider-aws"),
            },
            Provider::Azure => ProviderMeta {
                label: "Azure AKS",
                support_level: SupportLevel::Preview,
                chart_repo: Some("oci://mcr.microsoft.com/aks/karpenter/karpenter"),
                docs_url: Some("https://learn.microsoft.com/en-us/azure/aks/karpenter-overview"),
                provider_repo: Some("https://github.com/Azure/karpenter-provider-azure-aks"),
            },
            Provider::Gcp => ProviderMeta {
                label: "GCP GKE",
                support_level: SupportLevel::Experimental,
                chart_repo: Some("oci://us-east1-docker.pkg.dev/k8s-staging-karpenter/karpenter/karpenter"),
                docs_url: Some("https://github.com/kubernetes-sigs/karpenter-provider-gcp#readme"),
                provider_repo: Some("https://github.com/kubernetes-sigs/karpenter-provider-gcp"),
            },
            Provider::Unknown => ProviderMeta {
                label: "On-prem / Other",
                support_level: SupportLevel::Unsupported,
                chart_repo: None,
                docs_url: None,
                provider_repo: None,
            },
        }
    }

    pub fn support_level(&self) -> SupportLevel {
        self.meta().support_level
    }

    /// Returns true when a Karpenter provider exists for this platform
    pub fn is_supported(&self) -> bool {
        *self != Provider::Unknown
    }

    /// Parse a user-supplied provider name such as `aws`, `eks` or `gke`
    pub fn parse(s: &str) -> Provider {
        match s.trim().to_lowercase().as_str() {
            "aws" | "eks" => Provider::Aws,
            "azure" | "aks" => Provider::Azure,
            "gcp" | "gke" | "google" => Provider::Gcp,
            _ => Provider::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Gcp => "gcp",
            Provider::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identify the provider from a kubeconfig API server URL
pub fn provider_from_server_url(server_url: &str) -> Provider {
    let url = server_url.to_lowercase();
    if url.contains("eks.amazonaws.com") || url.contains(".elb.amazonaws.com") {
        Provider::Aws
    } else if url.contains("azmk8s.io") || url.contains(".azure.com") {
        Provider::Azure
    } else if url.contains("googleapis.com") || url.contains(".gke.io") {
        Provider::Gcp
    } else {
        Provider::Unknown
    }
}

/// Identify the provider from a node's `spec.providerID`
pub fn provider_from_provider_id(provider_id: &str) -> Provider {
    let pid = provider_id.to_lowercase();
    if pid.starts_with("aws://") || pid.contains("amazonaws.com") {
        Provider::Aws
    } else if pid.starts_with("azure://") || pid.contains("microsoft.compute") {
        Provider::Azure
    } else if pid.starts_with("gce://") || pid.starts_with("gcp://") {
        Provider::Gcp
    } else {
        Provider::Unknown
    }
}

/// Identity of one inspected cluster. Computed fresh on every inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub context: String,
    pub provider: Provider,
    pub support_level: SupportLevel,
}

impl ClusterIdentity {
    pub fn new(context: impl Into<String>, provider: Provider) -> Self {
        Self {
            context: context.into(),
            provider,
            support_level: provider.support_level(),
        }
    }
}

/// Raw cluster data needed by the decision engine
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// API server URL configured for the context, if known
    async fn server_endpoint(&self, context: &str) -> Option<String>;

    /// Kubernetes server version as reported by the API server (e.g. `v1.30.2-eks-1a2b3c`)
    async fn server_version(&self, context: &str) -> Result<String, SourceError>;

    /// `spec.providerID` of (at most a few) cluster nodes
    async fn node_provider_ids(&self, context: &str) -> Result<Vec<String>, SourceError>;

    /// Resource requests of every running pod
    async fn running_pods(&self, context: &str) -> Result<Vec<PodRequests>, SourceError>;

    /// Whether any Job or CronJob exists
    async fn has_batch_workloads(&self, context: &str) -> Result<bool, SourceError>;

    /// Deployments that may belong to the controller
    async fn controller_deployments(&self, context: &str) -> Result<Vec<DeploymentInfo>, SourceError>;
}

/// Detect the provider of a cluster: the kubeconfig server URL first, then
/// the node provider IDs. Detection failures yield [`Provider::Unknown`].
pub async fn detect_provider(source: &dyn ClusterSource, context: &str) -> Provider {
    if let Some(endpoint) = source.server_endpoint(context).await {
        let provider = provider_from_server_url(&endpoint);
        if provider.is_supported() {
            debug!(context, %provider, "Provider detected from server URL");
            return provider;
        }
    }

    match source.node_provider_ids(context).await {
        Ok(ids) => ids
            .iter()
            .map(|id| provider_from_provider_id(id))
            .find(Provider::is_supported)
            .unwrap_or(Provider::Unknown),
        Err(e) => {
            debug!(context, error = %e, "Could not read node provider IDs");
            Provider::Unknown
        }
    }
}

/// Build the identity of a cluster
pub async fn identify(source: &dyn ClusterSource, context: &str) -> ClusterIdentity {
    ClusterIdentity::new(context, detect_provider(source, context).await)
}
