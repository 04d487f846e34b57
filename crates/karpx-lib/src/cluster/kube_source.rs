//! Kubernetes API backed cluster source
//!
//! Reads kubeconfig contexts and talks to each cluster with `kube`. Clients
//! are built lazily per context and reused for the lifetime of the source.

use super::controller::DeploymentInfo;
use super::quantity::{parse_cpu_millicores, parse_memory_mib};
use super::{ClusterSource, SourceError};
use crate::workload::{PodRequests, GPU_RESOURCES};
use async_trait::async_trait;
use dashmap::DashMap;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::PathBuf;
use tracing::debug;

/// Cluster source backed by kubeconfig contexts
pub struct KubeClusterSource {
    kubeconfig_path: Option<PathBuf>,
    clients: DashMap<String, Client>,
}

impl Default for KubeClusterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl KubeClusterSource {
    /// Use the default kubeconfig (`$KUBECONFIG` or `~/.kube/config`)
    pub fn new() -> Self {
        Self {
            kubeconfig_path: None,
            clients: DashMap::new(),
        }
    }

    /// Use an explicit kubeconfig file
    pub fn with_kubeconfig(path: impl Into<PathBuf>) -> Self {
        Self {
            kubeconfig_path: Some(path.into()),
            clients: DashMap::new(),
        }
    }

    fn read_kubeconfig(&self) -> Result<Kubeconfig, SourceError> {
        let result = match &self.kubeconfig_path {
            Some(path) => Kubeconfig::read_from(path),
            None => Kubeconfig::read(),
        };
        result.map_err(|e| SourceError::Kubeconfig(e.to_string()))
    }

    /// Every context name in the kubeconfig, in file order
    pub fn list_contexts(&self) -> Result<Vec<String>, SourceError> {
        let kubeconfig = self.read_kubeconfig()?;
        Ok(kubeconfig.contexts.into_iter().map(|c| c.name).collect())
    }

    /// The kubeconfig's current context
    pub fn current_context(&self) -> Result<String, SourceError> {
        self.read_kubeconfig()?
            .current_context
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SourceError::ContextNotFound(String::new()))
    }

    /// Resolve an empty context name to the current context
    fn resolve_context(&self, context: &str) -> Result<String, SourceError> {
        if context.is_empty() {
            self.current_context()
        } else {
            Ok(context.to_string())
        }
    }

    async fn client(&self, context: &str) -> Result<Client, SourceError> {
        let context = self.resolve_context(context)?;
        if let Some(client) = self.clients.get(&context) {
            return Ok(client.clone());
        }

        let kubeconfig = self.read_kubeconfig()?;
        if !kubeconfig.contexts.iter().any(|c| c.name == context) {
            return Err(SourceError::ContextNotFound(context));
        }

        let options = KubeConfigOptions {
            context: Some(context.clone()),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| SourceError::Kubeconfig(e.to_string()))?;
        let client = Client::try_from(config).map_err(|e| SourceError::Client(e.to_string()))?;

        debug!(context = %context, "Created Kubernetes client");
        self.clients.insert(context, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl ClusterSource for KubeClusterSource {
    async fn server_endpoint(&self, context: &str) -> Option<String> {
        let context = self.resolve_context(context).ok()?;
        let kubeconfig = self.read_kubeconfig().ok()?;

        let cluster_name = kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == context)?
            .context
            .as_ref()?
            .cluster
            .clone();

        kubeconfig
            .clusters
            .into_iter()
            .find(|c| c.name == cluster_name)?
            .cluster?
            .server
    }

    async fn server_version(&self, context: &str) -> Result<String, SourceError> {
        let client = self.client(context).await?;
        let info = client
            .apiserver_version()
            .await
            .map_err(|e| SourceError::api("get server version", e))?;
        Ok(info.git_version)
    }

    async fn node_provider_ids(&self, context: &str) -> Result<Vec<String>, SourceError> {
        let nodes: Api<Node> = Api::all(self.client(context).await?);
        let list = nodes
            .list(&ListParams::default().limit(1))
            .await
            .map_err(|e| SourceError::api("list nodes", e))?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|node| node.spec.and_then(|spec| spec.provider_id))
            .collect())
    }

    async fn running_pods(&self, context: &str) -> Result<Vec<PodRequests>, SourceError> {
        let pods: Api<Pod> = Api::all(self.client(context).await?);
        let list = pods
            .list(&ListParams::default().fields("status.phase=Running"))
            .await
            .map_err(|e| SourceError::api("list pods", e))?;

        Ok(list.items.into_iter().map(pod_requests).collect())
    }

    async fn has_batch_workloads(&self, context: &str) -> Result<bool, SourceError> {
        let client = self.client(context).await?;
        let params = ListParams::default().limit(1);

        let jobs: Api<Job> = Api::all(client.clone());
        let job_list = jobs
            .list(&params)
            .await
            .map_err(|e| SourceError::api("list jobs", e))?;
        if !job_list.items.is_empty() {
            return Ok(true);
        }

        let cron_jobs: Api<CronJob> = Api::all(client);
        let cron_list = cron_jobs
            .list(&params)
            .await
            .map_err(|e| SourceError::api("list cronjobs", e))?;
        Ok(!cron_list.items.is_empty())
    }

    async fn controller_deployments(&self, context: &str) -> Result<Vec<DeploymentInfo>, SourceError> {
        let deployments: Api<Deployment> = Api::all(self.client(context).await?);
        let list = deployments
            .list(&ListParams::default())
            .await
            .map_err(|e| SourceError::api("list deployments", e))?;

        Ok(list.items.into_iter().map(deployment_info).collect())
    }
}

/// Sum the container requests of one pod
fn pod_requests(pod: Pod) -> PodRequests {
    let namespace = pod.metadata.namespace.unwrap_or_else(|| "default".to_string());
    let mut requests = PodRequests {
        namespace,
        ..Default::default()
    };

    let containers = pod.spec.map(|spec| spec.containers).unwrap_or_default();
    for container in containers {
        let Some(container_requests) = container.resources.and_then(|r| r.requests) else {
            continue;
        };
        if let Some(cpu) = container_requests.get("cpu") {
            requests.cpu_millis += parse_cpu_millicores(&cpu.0);
        }
        if let Some(memory) = container_requests.get("memory") {
            requests.memory_mib += parse_memory_mib(&memory.0);
        }
        if container_requests
            .keys()
            .any(|name| GPU_RESOURCES.contains(&name.as_str()))
        {
            requests.gpu = true;
        }
    }

    requests
}

fn deployment_info(deployment: Deployment) -> DeploymentInfo {
    let images = deployment
        .spec
        .and_then(|spec| spec.template.spec)
        .map(|pod_spec| {
            pod_spec
                .containers
                .into_iter()
                .filter_map(|c| c.image)
                .collect()
        })
        .unwrap_or_default();

    DeploymentInfo {
        name: deployment.metadata.name.unwrap_or_default(),
        namespace: deployment.metadata.namespace.unwrap_or_default(),
        labels: deployment.metadata.labels.unwrap_or_default(),
        images,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::BTreeMap;

    fn container(requests: &[(&str, &str)]) -> Container {
        Container {
            name: "app".to_string(),
            resources: Some(ResourceRequirements {
                requests: Some(
                    requests
                        .iter()
                        .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
                        .collect::<BTreeMap<_, _>>(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_requests_sums_containers() {
        let mut pod = Pod::default();
        pod.metadata.namespace = Some("payments".to_string());
        pod.spec = Some(PodSpec {
            containers: vec![
                container(&[("cpu", "250m"), ("memory", "512Mi")]),
                container(&[("cpu", "1"), ("memory", "1Gi"), ("nvidia.com/gpu", "1")]),
                Container::default(),
            ],
            ..Default::default()
        });

        let requests = pod_requests(pod);

        assert_eq!(requests.namespace, "payments");
        assert_eq!(requests.cpu_millis, 1250);
        assert_eq!(requests.memory_mib, 1536);
        assert!(requests.gpu);
    }

    #[test]
    fn test_pod_without_spec_has_no_requests() {
        let requests = pod_requests(Pod::default());
        assert_eq!(requests.namespace, "default");
        assert_eq!(requests.cpu_millis, 0);
        assert!(!requests.gpu);
    }

    #[test]
    fn test_missing_kubeconfig_is_reported() {
        let source = KubeClusterSource::with_kubeconfig("/nonexistent/karpx/kubeconfig");
        assert!(matches!(source.list_contexts(), Err(SourceError::Kubeconfig(_))));
    }
}
