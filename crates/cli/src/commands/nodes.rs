//! Node pool recommendation command

use super::App;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use karpx_lib::cluster::detect_provider;
use karpx_lib::workload::analyze_workloads;
use karpx_lib::{OptimizationMode, Provider, Recommendation, RecommendationEngine, WorkloadProfile};
use serde::Serialize;

#[derive(Serialize)]
struct NodesReport<'a> {
    context: &'a str,
    profile: &'a WorkloadProfile,
    recommendation: &'a Recommendation,
}

/// Analyze running workloads and recommend a node pool shape
pub async fn nodes(app: &App, provider: Option<String>, mode: Option<OptimizationMode>) -> Result<()> {
    let source = app.source();
    let context = app.resolve_context(&source)?;

    let provider = match provider {
        Some(name) => Provider::parse(&name),
        None => detect_provider(&*source, &context).await,
    };
    let mode = mode.or(app.config.default_mode).unwrap_or_default();

    let profile = analyze_workloads(&*source, &context)
        .await
        .with_context(|| format!("Failed to analyze workloads in {context}"))?;
    let recommendation = RecommendationEngine::builtin().build(&profile, mode, provider);

    match app.format {
        OutputFormat::Json => output::print_json(&NodesReport {
            context: &context,
            profile: &profile,
            recommendation: &recommendation,
        })?,
        OutputFormat::Table => print_recommendation(&context, &profile, &recommendation),
    }

    Ok(())
}

fn print_recommendation(context: &str, profile: &WorkloadProfile, rec: &Recommendation) {
    println!("Workloads in {context}");
    output::print_field("Pods", profile.total_pods);
    output::print_field("Namespaces", profile.namespaces);
    output::print_field("CPU requests", output::format_cpu(profile.total_cpu_millis));
    output::print_field("Memory requests", output::format_mib(profile.total_memory_mib));
    output::print_field("Largest pod", format!(
        "{} CPU, {}",
        output::format_cpu(profile.max_pod_cpu_millis),
        output::format_mib(profile.max_pod_memory_mib)
    ));
    output::print_field("Memory per core", format!("{:.1} GiB", profile.mem_per_core_gib));
    output::print_field("Archetype", rec.archetype);

    if profile.no_requests {
        output::print_warning("No pod sets resource requests; sizing falls back to the smallest nodes");
    }

    println!("\nRecommended node pool ({} mode, {})", rec.mode, rec.provider.meta().label);
    output::print_field("Instance families", rec.instance_families.join(", "));
    output::print_field("Capacity types", rec.capacity_types.join(", "));
    output::print_field("Architectures", rec.architectures.join(", "));
    output::print_field(
        "CPU sizes",
        rec.cpu_sizes.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", "),
    );
    output::print_field("Minimum node", format!(
        "{} vCPU, {}",
        rec.min_node_cpu,
        output::format_mib(rec.min_node_mem_mib)
    ));

    println!();
    for reason in &rec.reasoning {
        output::print_info(reason);
    }
}
