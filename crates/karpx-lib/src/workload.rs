//! Workload profiling and classification
//!
//! Aggregates the resource requests of running pods into a
//! [`WorkloadProfile`] and classifies it into a [`WorkloadArchetype`].

use crate::cluster::{ClusterSource, SourceError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Extended resource names that indicate GPU workloads
pub const GPU_RESOURCES: &[&str] = &["nvidia.com/gpu", "amd.com/gpu", "accelerator.google.com/gpu"];

/// Memory-per-core ratio above which workloads are memory-bound (GiB per core)
pub const MEMORY_BOUND_RATIO: f64 = 4.0;

/// Memory-per-core ratio below which workloads are compute-bound (GiB per core)
pub const CPU_BOUND_RATIO: f64 = 2.0;

/// Aggregated requests of one running pod
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRequests {
    pub namespace: String,
    pub cpu_millis: u64,
    pub memory_mib: u64,
    pub gpu: bool,
}

/// Summary of the resource demands of all running workloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadProfile {
    pub total_pods: usize,
    /// Aggregate CPU requests in millicores
    pub total_cpu_millis: u64,
    /// Aggregate memory requests in MiB
    pub total_memory_mib: u64,
    /// Largest single-pod CPU request in millicores
    pub max_pod_cpu_millis: u64,
    /// Largest single-pod memory request in MiB
    pub max_pod_memory_mib: u64,
    pub has_gpu: bool,
    pub has_batch_jobs: bool,
    /// Average GiB of memory requested per requested CPU core
    pub mem_per_core_gib: f64,
    /// Distinct namespaces with running pods
    pub namespaces: usize,
    /// True when no resource requests are set at all
    pub no_requests: bool,
}

impl WorkloadProfile {
    /// Build a profile from per-pod requests
    pub fn from_pods(pods: &[PodRequests], has_batch_jobs: bool) -> Self {
        let mut profile = WorkloadProfile {
            total_pods: pods.len(),
            has_batch_jobs,
            ..Default::default()
        };
        let mut namespaces = HashSet::new();

        for pod in pods {
            namespaces.insert(pod.namespace.as_str());
            profile.total_cpu_millis = profile.total_cpu_millis.saturating_add(pod.cpu_millis);
            profile.total_memory_mib = profile.total_memory_mib.saturating_add(pod.memory_mib);
            profile.max_pod_cpu_millis = profile.max_pod_cpu_millis.max(pod.cpu_millis);
            profile.max_pod_memory_mib = profile.max_pod_memory_mib.max(pod.memory_mib);
            profile.has_gpu |= pod.gpu;
        }

        profile.namespaces = namespaces.len();
        if profile.total_cpu_millis > 0 {
            profile.mem_per_core_gib =
                (profile.total_memory_mib as f64 / 1024.0) / (profile.total_cpu_millis as f64 / 1000.0);
        }
        profile.no_requests = profile.total_cpu_millis == 0 && profile.total_memory_mib == 0;
        profile
    }

    /// Classify the dominant workload pattern
    pub fn archetype(&self) -> WorkloadArchetype {
        classify(self)
    }
}

/// Dominant resource pattern of a workload set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadArchetype {
    General,
    Memory,
    Cpu,
    Gpu,
    Batch,
    Unknown,
}

impl WorkloadArchetype {
    pub const ALL: [WorkloadArchetype; 6] = [
        WorkloadArchetype::General,
        WorkloadArchetype::Memory,
        WorkloadArchetype::Cpu,
        WorkloadArchetype::Gpu,
        WorkloadArchetype::Batch,
        WorkloadArchetype::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadArchetype::General => "general",
            WorkloadArchetype::Memory => "memory",
            WorkloadArchetype::Cpu => "cpu",
            WorkloadArchetype::Gpu => "gpu",
            WorkloadArchetype::Batch => "batch",
            WorkloadArchetype::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WorkloadArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a profile.
///
/// GPU dominates; then a profile without data is unknown; then the
/// memory-per-core ratio decides memory/cpu; then batch jobs; else general.
pub fn classify(profile: &WorkloadProfile) -> WorkloadArchetype {
    if profile.has_gpu {
        return WorkloadArchetype::Gpu;
    }
    if profile.no_requests || profile.total_pods == 0 {
        return WorkloadArchetype::Unknown;
    }
    if profile.mem_per_core_gib > MEMORY_BOUND_RATIO {
        return WorkloadArchetype::Memory;
    }
    if profile.mem_per_core_gib > 0.0 && profile.mem_per_core_gib < CPU_BOUND_RATIO {
        return WorkloadArchetype::Cpu;
    }
    if profile.has_batch_jobs {
        return WorkloadArchetype::Batch;
    }
    WorkloadArchetype::General
}

/// Build the workload profile of a cluster from its running pods and batch workloads
pub async fn analyze_workloads(source: &dyn ClusterSource, context: &str) -> Result<WorkloadProfile, SourceError> {
    let pods = source.running_pods(context).await?;
    // Batch detection is best effort: RBAC often denies cluster-wide Job reads
    let has_batch_jobs = match source.has_batch_workloads(context).await {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(context, error = %e, "Could not list batch workloads");
            false
        }
    };
    Ok(WorkloadProfile::from_pods(&pods, has_batch_jobs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(namespace: &str, cpu_millis: u64, memory_mib: u64) -> PodRequests {
        PodRequests {
            namespace: namespace.to_string(),
            cpu_millis,
            memory_mib,
            gpu: false,
        }
    }

    #[test]
    fn test_profile_aggregates() {
        let pods = vec![pod("a", 500, 1024), pod("a", 2000, 2048), pod("b", 250, 512)];

        let profile = WorkloadProfile::from_pods(&pods, false);

        assert_eq!(profile.total_pods, 3);
        assert_eq!(profile.total_cpu_millis, 2750);
        assert_eq!(profile.total_memory_mib, 3584);
        assert_eq!(profile.max_pod_cpu_millis, 2000);
        assert_eq!(profile.max_pod_memory_mib, 2048);
        assert_eq!(profile.namespaces, 2);
        assert!(!profile.no_requests);
        assert!((profile.mem_per_core_gib - 3.5 / 2.75).abs() < 1e-9);
    }

    #[test]
    fn test_huge_requests_saturate_totals() {
        let pods = vec![pod("a", u64::MAX, u64::MAX), pod("b", u64::MAX, 1)];

        let profile = WorkloadProfile::from_pods(&pods, false);

        assert_eq!(profile.total_cpu_millis, u64::MAX);
        assert_eq!(profile.total_memory_mib, u64::MAX);
        assert_eq!(profile.max_pod_cpu_millis, u64::MAX);

        let rec = crate::nodes::RecommendationEngine::builtin().build(
            &profile,
            crate::nodes::OptimizationMode::Balanced,
            crate::cluster::Provider::Aws,
        );
        assert_eq!(rec.min_node_cpu, 64);
        assert_eq!(rec.min_node_mem_mib, 262144);
    }

    #[test]
    fn test_empty_profile_is_unknown() {
        let profile = WorkloadProfile::from_pods(&[], false);
        assert!(profile.no_requests);
        assert_eq!(classify(&profile), WorkloadArchetype::Unknown);
    }

    #[test]
    fn test_pods_without_requests_are_unknown() {
        let profile = WorkloadProfile::from_pods(&[pod("a", 0, 0), pod("b", 0, 0)], true);
        assert_eq!(classify(&profile), WorkloadArchetype::Unknown);
    }

    #[test]
    fn test_gpu_dominates() {
        let mut gpu_pod = pod("ml", 0, 0);
        gpu_pod.gpu = true;
        let profile = WorkloadProfile::from_pods(&[gpu_pod], false);
        assert_eq!(classify(&profile), WorkloadArchetype::Gpu);
    }

    #[test]
    fn test_ratio_thresholds() {
        // 8 GiB per core
        let memory = WorkloadProfile::from_pods(&[pod("a", 1000, 8192)], true);
        assert_eq!(classify(&memory), WorkloadArchetype::Memory);

        // 1 GiB per core
        let cpu = WorkloadProfile::from_pods(&[pod("a", 4000, 4096)], true);
        assert_eq!(classify(&cpu), WorkloadArchetype::Cpu);

        // 3 GiB per core, no jobs
        let general = WorkloadProfile::from_pods(&[pod("a", 1000, 3072)], false);
        assert_eq!(classify(&general), WorkloadArchetype::General);

        // 3 GiB per core with jobs
        let batch = WorkloadProfile::from_pods(&[pod("a", 1000, 3072)], true);
        assert_eq!(classify(&batch), WorkloadArchetype::Batch);
    }

    #[test]
    fn test_memory_only_requests_are_not_cpu_bound() {
        let profile = WorkloadProfile::from_pods(&[pod("a", 0, 1024)], false);
        assert_eq!(profile.mem_per_core_gib, 0.0);
        assert_eq!(classify(&profile), WorkloadArchetype::General);
    }
}
