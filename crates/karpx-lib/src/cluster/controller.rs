//! Karpenter installation detection
//!
//! The controller is recognised by its Deployment: a name or
//! `app.kubernetes.io/name` label containing "karpenter". The version comes
//! from the `app.kubernetes.io/version` label set by the Helm chart, falling
//! back to the controller image tag.

use super::{ClusterSource, SourceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const NAME_LABEL: &str = "app.kubernetes.io/name";
const VERSION_LABEL: &str = "app.kubernetes.io/version";
const CONTROLLER_MARKER: &str = "karpenter";

/// Deployment metadata relevant to controller detection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl DeploymentInfo {
    fn is_controller(&self) -> bool {
        self.name.to_lowercase().contains(CONTROLLER_MARKER)
            || self
                .labels
                .get(NAME_LABEL)
                .map(|v| v.to_lowercase().contains(CONTROLLER_MARKER))
                .unwrap_or(false)
    }

    fn version(&self) -> Option<String> {
        if let Some(version) = self.labels.get(VERSION_LABEL).filter(|v| !v.is_empty()) {
            return Some(version.trim_start_matches('v').to_string());
        }

        self.images
            .iter()
            .filter(|image| image.to_lowercase().contains(CONTROLLER_MARKER))
            .find_map(|image| image_tag(image))
            .map(|tag| tag.trim_start_matches('v').to_string())
    }
}

/// Tag of an image reference, ignoring any digest
fn image_tag(image: &str) -> Option<&str> {
    let without_digest = image.split('@').next().unwrap_or(image);
    let last_segment = without_digest.rsplit('/').next().unwrap_or(without_digest);
    last_segment
        .split_once(':')
        .map(|(_, tag)| tag)
        .filter(|tag| !tag.is_empty())
}

/// Controller installation found (or not) on a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInstall {
    pub installed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Bare version without a leading `v`, when it could be determined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ControllerInstall {
    pub fn not_installed() -> Self {
        Self::default()
    }
}

/// Pick the controller out of a list of deployments
pub fn find_controller(deployments: &[DeploymentInfo]) -> ControllerInstall {
    deployments
        .iter()
        .find(|d| d.is_controller())
        .map(|d| ControllerInstall {
            installed: true,
            name: Some(d.name.clone()),
            namespace: Some(d.namespace.clone()),
            version: d.version(),
        })
        .unwrap_or_else(ControllerInstall::not_installed)
}

/// Detect the controller installation on a cluster
pub async fn detect_controller(source: &dyn ClusterSource, context: &str) -> Result<ControllerInstall, SourceError> {
    let deployments = source.controller_deployments(context).await?;
    Ok(find_controller(&deployments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(name: &str, labels: &[(&str, &str)], images: &[&str]) -> DeploymentInfo {
        DeploymentInfo {
            name: name.to_string(),
            namespace: "kube-system".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            images: images.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_version_from_chart_label() {
        let deployments = vec![
            deployment("coredns", &[], &["registry.k8s.io/coredns/coredns:v1.11.1"]),
            deployment(
                "karpenter",
                &[(VERSION_LABEL, "1.2.1")],
                &["public.ecr.aws/karpenter/controller:1.2.1@sha256:abc"],
            ),
        ];

        let install = find_controller(&deployments);

        assert!(install.installed);
        assert_eq!(install.name.as_deref(), Some("karpenter"));
        assert_eq!(install.namespace.as_deref(), Some("kube-system"));
        assert_eq!(install.version.as_deref(), Some("1.2.1"));
    }

    #[test]
    fn test_version_from_image_tag() {
        let deployments = vec![deployment(
            "autoscaler",
            &[(NAME_LABEL, "karpenter")],
            &["public.ecr.aws/karpenter/controller:v0.37.0@sha256:abc"],
        )];

        let install = find_controller(&deployments);

        assert!(install.installed);
        assert_eq!(install.version.as_deref(), Some("0.37.0"));
    }

    #[test]
    fn test_not_installed() {
        let deployments = vec![deployment("cluster-autoscaler", &[], &["registry.k8s.io/autoscaling/cluster-autoscaler:v1.30.0"])];
        assert_eq!(find_controller(&deployments), ControllerInstall::not_installed());
        assert!(!find_controller(&[]).installed);
    }

    #[test]
    fn test_image_tag_parsing() {
        assert_eq!(image_tag("repo:5000/karpenter/controller:1.0.0"), Some("1.0.0"));
        assert_eq!(image_tag("karpenter/controller"), None);
        assert_eq!(image_tag("karpenter/controller@sha256:abc"), None);
    }
}
