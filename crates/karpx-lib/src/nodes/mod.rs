//! Workload-aware node recommendations
//!
//! [`RecommendationEngine::build`] maps a workload profile, an optimization
//! mode and a provider to a concrete instance selection. The selection comes
//! from a [`PolicyTable`] lookup; sizing comes from the largest observed pod.

mod policy;
mod sizing;

pub use policy::{PolicyCell, PolicyGaps, PolicyKey, PolicyTable};
pub use sizing::{cpu_sizes, min_node_cpu, min_node_memory_mib, CPU_BUCKETS, MEMORY_BUCKETS_MIB};

use crate::cluster::Provider;
use crate::workload::{WorkloadArchetype, WorkloadProfile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

const GENERIC_GUIDANCE: &str = "Provider unknown: showing generic guidance only";

/// Provisioning priority chosen by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationMode {
    Cost,
    #[default]
    Balanced,
    Performance,
}

impl OptimizationMode {
    pub const ALL: [OptimizationMode; 3] = [OptimizationMode::Cost, OptimizationMode::Balanced, OptimizationMode::Performance];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationMode::Cost => "cost",
            OptimizationMode::Balanced => "balanced",
            OptimizationMode::Performance => "performance",
        }
    }
}

impl fmt::Display for OptimizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown optimization mode {0:?} (expected cost, balanced or performance)")]
pub struct UnknownMode(pub String);

impl FromStr for OptimizationMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cost" | "cost-optimized" => Ok(OptimizationMode::Cost),
            "balanced" => Ok(OptimizationMode::Balanced),
            "performance" | "high-performance" | "perf" => Ok(OptimizationMode::Performance),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// Node pool parameters for one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub mode: OptimizationMode,
    pub archetype: WorkloadArchetype,
    pub provider: Provider,
    pub instance_families: Vec<String>,
    pub capacity_types: Vec<String>,
    pub architectures: Vec<String>,
    /// vCPU sizes to allow, ascending
    pub cpu_sizes: Vec<u32>,
    pub min_node_cpu: u32,
    pub min_node_mem_mib: u64,
    pub reasoning: Vec<String>,
}

/// Builds recommendations from a read-only policy table
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    table: Arc<PolicyTable>,
}

static BUILTIN_TABLE: OnceLock<Arc<PolicyTable>> = OnceLock::new();

impl RecommendationEngine {
    pub fn new(table: PolicyTable) -> Self {
        Self { table: Arc::new(table) }
    }

    /// Engine over the embedded policy table, shared process-wide
    pub fn builtin() -> Self {
        let table = BUILTIN_TABLE.get_or_init(|| Arc::new(PolicyTable::builtin()));
        Self { table: Arc::clone(table) }
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    /// Build a recommendation. Never fails: unsupported providers get generic
    /// guidance and empty selections.
    pub fn build(&self, profile: &WorkloadProfile, mode: OptimizationMode, provider: Provider) -> Recommendation {
        let archetype = profile.archetype();
        let min_node_cpu = min_node_cpu(profile.max_pod_cpu_millis);

        let mut recommendation = Recommendation {
            mode,
            archetype,
            provider,
            instance_families: Vec::new(),
            capacity_types: Vec::new(),
            architectures: Vec::new(),
            cpu_sizes: cpu_sizes(min_node_cpu),
            min_node_cpu,
            min_node_mem_mib: min_node_memory_mib(profile.max_pod_memory_mib),
            reasoning: Vec::new(),
        };

        let cell = if provider.is_supported() {
            self.table
                .cell(provider, mode, archetype)
                .or_else(|| self.table.cell(provider, mode, WorkloadArchetype::General))
        } else {
            None
        };

        match cell {
            Some(cell) => {
                recommendation.instance_families = cell.families.clone();
                if profile.has_batch_jobs {
                    recommendation
                        .instance_families
                        .extend(cell.batch_families.iter().cloned());
                }
                recommendation.capacity_types = cell.capacity_types.clone();
                recommendation.architectures = cell.architectures.clone();
                recommendation.reasoning = cell.reasoning.clone();
            }
            None => {
                tracing::debug!(%provider, %mode, %archetype, "No policy cell, using generic guidance");
                recommendation.reasoning.push(GENERIC_GUIDANCE.to_string());
            }
        }

        recommendation
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::PodRequests;

    fn profile(pods: &[(u64, u64)], has_batch_jobs: bool) -> WorkloadProfile {
        let pods: Vec<PodRequests> = pods
            .iter()
            .map(|&(cpu_millis, memory_mib)| PodRequests {
                namespace: "default".to_string(),
                cpu_millis,
                memory_mib,
                gpu: false,
            })
            .collect();
        WorkloadProfile::from_pods(&pods, has_batch_jobs)
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("cost".parse::<OptimizationMode>(), Ok(OptimizationMode::Cost));
        assert_eq!("Cost-Optimized".parse::<OptimizationMode>(), Ok(OptimizationMode::Cost));
        assert_eq!("perf".parse::<OptimizationMode>(), Ok(OptimizationMode::Performance));
        assert_eq!("high-performance".parse::<OptimizationMode>(), Ok(OptimizationMode::Performance));
        assert_eq!(" balanced ".parse::<OptimizationMode>(), Ok(OptimizationMode::Balanced));
        assert!("fastest".parse::<OptimizationMode>().is_err());
        assert_eq!(OptimizationMode::default(), OptimizationMode::Balanced);
    }

    #[test]
    fn test_empty_cluster_balanced_aws() {
        let engine = RecommendationEngine::builtin();
        let rec = engine.build(&WorkloadProfile::from_pods(&[], false), OptimizationMode::Balanced, Provider::Aws);

        assert_eq!(rec.archetype, WorkloadArchetype::Unknown);
        assert_eq!(rec.architectures, vec!["arm64", "amd64"]);
        assert_eq!(rec.instance_families, vec!["m7g", "m7i", "c7g", "c7i", "m6g", "m6i"]);
        assert_eq!(rec.capacity_types, vec!["spot", "on-demand"]);
        assert_eq!(rec.min_node_cpu, 2);
        assert_eq!(rec.min_node_mem_mib, 2048);
        assert_eq!(rec.cpu_sizes, vec![2, 4, 8, 16, 32, 48, 64]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let engine = RecommendationEngine::builtin();
        let p = profile(&[(500, 8192), (250, 4096)], false);

        let first = engine.build(&p, OptimizationMode::Cost, Provider::Aws);
        let second = engine.build(&p.clone(), OptimizationMode::Cost, Provider::Aws);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_unknown_provider_gets_generic_guidance() {
        let engine = RecommendationEngine::builtin();
        let rec = engine.build(&profile(&[(1000, 2048)], false), OptimizationMode::Cost, Provider::Unknown);

        assert!(rec.instance_families.is_empty());
        assert!(rec.capacity_types.is_empty());
        assert!(rec.architectures.is_empty());
        assert_eq!(rec.reasoning, vec![GENERIC_GUIDANCE.to_string()]);
        // sizing is still derived from the workloads
        assert_eq!(rec.min_node_cpu, 2);
    }

    #[test]
    fn test_batch_jobs_extend_performance_compute() {
        let engine = RecommendationEngine::builtin();

        // 1 GiB per core: compute-bound even with jobs present
        let with_jobs = engine.build(&profile(&[(4000, 4096)], true), OptimizationMode::Performance, Provider::Aws);
        assert_eq!(with_jobs.archetype, WorkloadArchetype::Cpu);
        assert_eq!(with_jobs.instance_families, vec!["c7i", "c6i", "c5n", "hpc7g", "c6a"]);

        let without_jobs = engine.build(&profile(&[(4000, 4096)], false), OptimizationMode::Performance, Provider::Aws);
        assert_eq!(without_jobs.instance_families, vec!["c7i", "c6i", "c5n", "hpc7g"]);
    }

    #[test]
    fn test_sizing_follows_largest_pod() {
        let engine = RecommendationEngine::builtin();
        let rec = engine.build(&profile(&[(7000, 12_000), (100, 128)], false), OptimizationMode::Balanced, Provider::Gcp);

        assert_eq!(rec.min_node_cpu, 16);
        assert_eq!(rec.min_node_mem_mib, 16384);
        assert_eq!(rec.cpu_sizes, vec![16, 32, 48, 64]);
        assert_eq!(rec.instance_families, vec!["n2", "n2d", "c2d"]);
    }

    #[test]
    fn test_custom_table_falls_back_to_general() {
        let mut table = PolicyTable::new();
        table.insert(
            (Provider::Azure, OptimizationMode::Cost, WorkloadArchetype::General),
            PolicyCell {
                families: vec!["D".to_string()],
                architectures: vec!["amd64".to_string()],
                capacity_types: vec!["spot".to_string()],
                reasoning: vec!["general".to_string()],
                batch_families: vec![],
            },
        );
        let engine = RecommendationEngine::new(table);

        let rec = engine.build(&profile(&[(1000, 8192)], false), OptimizationMode::Cost, Provider::Azure);
        assert_eq!(rec.archetype, WorkloadArchetype::Memory);
        assert_eq!(rec.instance_families, vec!["D"]);
    }

    #[test]
    fn test_recommendation_serializes_lowercase() {
        let engine = RecommendationEngine::builtin();
        let rec = engine.build(&profile(&[(1000, 8192)], false), OptimizationMode::Performance, Provider::Azure);
        let json = serde_json::to_value(&rec).unwrap();

        assert_eq!(json["mode"], "performance");
        assert_eq!(json["archetype"], "memory");
        assert_eq!(json["provider"], "azure");
        assert_eq!(json["instance_families"][0], "E");
    }
}
