//! Cluster detection and multi-cluster status commands

use super::{interrupted, App};
use crate::output::{self, OutputFormat};
use anyhow::{bail, Context, Result};
use karpx_lib::ClusterStatus;
use serde::Serialize;
use tabled::Tabled;

#[derive(Serialize)]
struct DetectReport<'a> {
    #[serde(flatten)]
    status: &'a ClusterStatus,
    provider_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    chart_repo: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    docs_url: Option<&'static str>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Context")]
    context: String,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Kubernetes")]
    k8s_version: String,
    #[tabled(rename = "Karpenter")]
    controller: String,
    #[tabled(rename = "Status")]
    badge: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Minimum")]
    minimum: String,
}

impl From<&ClusterStatus> for StatusRow {
    fn from(status: &ClusterStatus) -> Self {
        let controller = if status.controller_installed {
            output::or_dash(status.controller_version.as_deref())
        } else {
            "-".to_string()
        };

        Self {
            context: status.context.clone(),
            provider: status.provider.meta().label.to_string(),
            k8s_version: output::or_dash(Some(status.k8s_version.as_str())),
            controller,
            badge: output::color_badge(status.badge(), status.latest_compatible.as_deref()),
            latest: output::or_dash(status.latest_compatible.as_deref()),
            minimum: output::or_dash(status.min_compatible.as_deref()),
        }
    }
}

/// Inspect the selected cluster and describe its provider and controller
pub async fn detect(app: &App) -> Result<()> {
    let source = app.source();
    let context = app.resolve_context(&source)?;
    let inspector = app.inspector(source)?;

    let status = inspector.inspect_one(&context).await;
    let meta = status.provider.meta();

    match app.format {
        OutputFormat::Json => {
            output::print_json(&DetectReport {
                status: &status,
                provider_label: meta.label,
                chart_repo: meta.chart_repo,
                docs_url: meta.docs_url,
            })?;
        }
        OutputFormat::Table => {
            println!("Cluster {}", status.context);
            output::print_field("Provider", format!("{} ({})", meta.label, output::color_support(meta.support_level)));
            output::print_field("Kubernetes", output::or_dash(Some(status.k8s_version.as_str())));
            output::print_field(
                "Karpenter",
                if status.controller_installed {
                    output::or_dash(status.controller_version.as_deref())
                } else {
                    "not installed".to_string()
                },
            );
            if let Some(compatible) = status.compatible {
                output::print_field("Compatibility", output::color_verdict(compatible));
            }
            output::print_field("Latest compatible", output::or_dash(status.latest_compatible.as_deref()));
            output::print_field("Minimum compatible", output::or_dash(status.min_compatible.as_deref()));
            if let Some(docs) = meta.docs_url {
                output::print_field("Docs", docs);
            }
            println!();

            if status.error.is_none() {
                print_hints(&status);
            }
        }
    }

    if let Some(error) = &status.error {
        bail!("{}: {}", status.context, error);
    }
    Ok(())
}

fn print_hints(status: &ClusterStatus) {
    let meta = status.provider.meta();

    if !status.provider.is_supported() {
        output::print_warning("Karpenter has no provider for this platform");
        return;
    }

    if !status.controller_installed {
        match (meta.chart_repo, status.latest_compatible.as_deref()) {
            (Some(chart), Some(version)) => {
                output::print_info(&format!("Install Karpenter {version} from {chart}"));
            }
            _ => output::print_info("Karpenter is not installed"),
        }
        return;
    }

    if status.compatible == Some(false) {
        output::print_warning(&format!(
            "Karpenter {} does not support Kubernetes {}",
            output::or_dash(status.controller_version.as_deref()),
            status.k8s_version
        ));
    }

    if status.upgrade_available {
        if let Some(latest) = &status.latest_compatible {
            output::print_info(&format!("Upgrade available: Karpenter {latest}"));
        }
    } else if status.compatible == Some(true) {
        output::print_success("Karpenter is up to date");
    }
}

/// Contexts named for `status`: the repeatable subcommand flag, else the
/// top-level context. `None` means every kubeconfig context.
fn selected_contexts(requested: Vec<String>, fallback: Option<&str>) -> Option<Vec<String>> {
    if !requested.is_empty() {
        return Some(requested);
    }
    fallback.map(|context| vec![context.to_string()])
}

/// Inspect several clusters concurrently and print one row per context
pub async fn status(app: &App, contexts: Vec<String>) -> Result<()> {
    let source = app.source();
    let contexts = match selected_contexts(contexts, app.context.as_deref()) {
        Some(contexts) => contexts,
        None => source.list_contexts().context("Failed to list kubeconfig contexts")?,
    };

    if contexts.is_empty() {
        output::print_warning("No contexts found in kubeconfig");
        return Ok(());
    }

    let inspector = app.inspector(source)?;
    let statuses = inspector.inspect_until(&contexts, interrupted()).await?;

    match app.format {
        OutputFormat::Json => output::print_json(&statuses)?,
        OutputFormat::Table => {
            output::print_table(statuses.iter().map(StatusRow::from).collect());

            for status in statuses.iter().filter(|s| s.is_error()) {
                if let Some(error) = &status.error {
                    output::print_error(&format!("{}: {}", status.context, error));
                }
            }

            let failed = statuses.iter().filter(|s| s.is_error()).count();
            println!(
                "\nChecked {} cluster(s), {} failed, at {}",
                statuses.len(),
                failed,
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}
