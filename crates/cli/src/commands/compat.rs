//! Version compatibility commands

use super::App;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Context, Result};
use karpx_lib::compat::{normalize_version, parse_version};
use karpx_lib::CompatMatrix;
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Serialize)]
struct CompatReport {
    controller: String,
    cluster: String,
    compatible: bool,
    /// Matrix row governing the controller version
    #[serde(skip_serializing_if = "Option::is_none")]
    rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_compatible: Option<String>,
}

fn compat_report(matrix: &CompatMatrix, controller: &str, cluster: &str) -> CompatReport {
    let rule = parse_version(controller)
        .and_then(|version| matrix.rule_for(&version).cloned())
        .map(|rule| {
            format!(
                "Karpenter {} supports Kubernetes {}.{} to {}.{}",
                rule.controller_range,
                rule.cluster_min.major,
                rule.cluster_min.minor,
                rule.cluster_max.major,
                rule.cluster_max.minor
            )
        });

    CompatReport {
        controller: normalize_version(controller),
        cluster: normalize_version(cluster),
        compatible: matrix.is_compatible(controller, cluster),
        rule,
        min_compatible: matrix.min_compatible_controller(cluster).map(|v| v.to_string()),
    }
}

/// Check one controller/cluster pair against the embedded matrix, offline
pub fn compat(app: &App, controller: &str, cluster: &str) -> Result<()> {
    let report = compat_report(CompatMatrix::shared(), controller, cluster);

    match app.format {
        OutputFormat::Json => output::print_json(&report)?,
        OutputFormat::Table => {
            println!(
                "Karpenter {} on Kubernetes {}: {}",
                report.controller,
                report.cluster,
                output::color_verdict(report.compatible)
            );
            match &report.rule {
                Some(rule) => output::print_field("Rule", rule),
                None => output::print_field("Rule", "no matrix row covers this controller version"),
            }
            output::print_field("Minimum compatible", output::or_dash(report.min_compatible.as_deref()));
        }
    }

    Ok(())
}

#[derive(Tabled)]
struct VersionRow {
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "")]
    note: String,
}

/// List released controller versions compatible with a cluster version
pub async fn versions(app: &App, cluster: &str) -> Result<()> {
    if parse_version(cluster).is_none() {
        bail!("Invalid Kubernetes version {cluster:?}");
    }

    let resolver = app.resolver()?;
    let releases = resolver
        .latest_compatible(cluster)
        .await
        .context("Failed to fetch Karpenter releases")?;
    let min_compatible = resolver.min_compatible_controller(cluster);

    match app.format {
        OutputFormat::Json => {
            output::print_json(&serde_json::json!({
                "cluster": normalize_version(cluster),
                "best": releases.best.as_ref().map(|v| v.to_string()),
                "versions": releases.all.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
                "min_compatible": min_compatible.map(|v| v.to_string()),
            }))?;
        }
        OutputFormat::Table => {
            if releases.is_empty() {
                output::print_warning(&format!(
                    "No released Karpenter version supports Kubernetes {}",
                    normalize_version(cluster)
                ));
                return Ok(());
            }

            let rows = releases
                .all
                .iter()
                .enumerate()
                .map(|(i, version)| VersionRow {
                    version: version.to_string(),
                    note: if i == 0 { "latest".to_string() } else { String::new() },
                })
                .collect();
            output::print_table(rows);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_for_supported_pair() {
        let report = compat_report(CompatMatrix::shared(), "v1.3.0", "1.31");

        assert!(report.compatible);
        assert_eq!(report.controller, "1.3.0");
        assert_eq!(report.cluster, "1.31.0");
        assert_eq!(
            report.rule.as_deref(),
            Some("Karpenter >=1.2.0, <1.4.0 supports Kubernetes 1.29 to 1.32")
        );
        assert_eq!(report.min_compatible.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_report_for_unknown_controller() {
        let report = compat_report(CompatMatrix::shared(), "0.20.0", "1.31.0");

        assert!(!report.compatible);
        assert!(report.rule.is_none());
    }

    #[test]
    fn test_report_for_garbage_versions() {
        let report = compat_report(CompatMatrix::shared(), "banana", "1.31.0");

        assert!(!report.compatible);
        assert!(report.rule.is_none());
    }
}
