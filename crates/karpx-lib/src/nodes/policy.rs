//! Instance selection policy table
//!
//! One cell per `(provider, mode, archetype)`. Adding a provider or a mode is
//! a change to [`BUILTIN_ROWS`], not to the recommendation code.

use super::OptimizationMode;
use crate::cluster::Provider;
use crate::workload::WorkloadArchetype;
use std::collections::HashMap;

use OptimizationMode::{Balanced, Cost, Performance};
use WorkloadArchetype::{Batch, Cpu, General, Gpu, Memory, Unknown};

const SPOT_AND_ON_DEMAND: &[&str] = &["spot", "on-demand"];
const ON_DEMAND: &[&str] = &["on-demand"];
const ARM_AND_AMD: &[&str] = &["arm64", "amd64"];
const AMD_ONLY: &[&str] = &["amd64"];

const ALL_ARCHETYPES: &[WorkloadArchetype] = &[General, Memory, Cpu, Gpu, Batch, Unknown];
const DEFAULT_ARCHETYPES: &[WorkloadArchetype] = &[General, Batch, Unknown];

/// Lookup key of a policy cell
pub type PolicyKey = (Provider, OptimizationMode, WorkloadArchetype);

/// Selection policy of one table cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyCell {
    /// Instance families in preference order
    pub families: Vec<String>,
    pub architectures: Vec<String>,
    pub capacity_types: Vec<String>,
    pub reasoning: Vec<String>,
    /// Families appended when the cluster runs batch jobs
    pub batch_families: Vec<String>,
}

impl PolicyCell {
    fn is_empty(&self) -> bool {
        self.families.is_empty()
            || self.architectures.is_empty()
            || self.capacity_types.is_empty()
            || self.reasoning.is_empty()
    }
}

/// Static description of the cells shared by several archetypes
struct Row {
    provider: Provider,
    mode: OptimizationMode,
    archetypes: &'static [WorkloadArchetype],
    families: &'static [&'static str],
    architectures: &'static [&'static str],
    capacity_types: &'static [&'static str],
    reasoning: &'static [&'static str],
    batch_families: &'static [&'static str],
}

const fn row(
    provider: Provider,
    mode: OptimizationMode,
    archetypes: &'static [WorkloadArchetype],
    families: &'static [&'static str],
    architectures: &'static [&'static str],
    capacity_types: &'static [&'static str],
    reasoning: &'static [&'static str],
) -> Row {
    Row {
        provider,
        mode,
        archetypes,
        families,
        architectures,
        capacity_types,
        reasoning,
        batch_families: &[],
    }
}

const BUILTIN_ROWS: &[Row] = &[
    // AWS EKS, cost
    row(
        Provider::Aws,
        Cost,
        &[Gpu],
        &["g5g", "g4dn", "g5"],
        ARM_AND_AMD,
        SPOT_AND_ON_DEMAND,
        &[
            "GPU workloads detected: spot-eligible GPU families, Graviton g5g first",
            "Spot GPU saves ~70% vs on-demand; ensure GPU pods tolerate interruption",
        ],
    ),
    row(
        Provider::Aws,
        Cost,
        &[Memory],
        &["r7g", "r6g", "r7i", "r6i"],
        ARM_AND_AMD,
        SPOT_AND_ON_DEMAND,
        &[
            "Memory-intensive workloads (>4 GiB/core): memory-optimised r-series families",
            "Graviton r7g/r6g selected first for best $/GiB ratio on Spot",
        ],
    ),
    row(
        Provider::Aws,
        Cost,
        &[Cpu],
        &["c7g", "c6g", "c7i", "c6i", "c6a"],
        ARM_AND_AMD,
        SPOT_AND_ON_DEMAND,
        &[
            "Compute-intensive workloads (<2 GiB/core): compute-optimised c-series families",
            "Graviton c7g/c6g offer best compute $/vCPU on Spot",
        ],
    ),
    row(
        Provider::Aws,
        Cost,
        &[Batch],
        &["m7g", "m6g", "c7g", "c6g", "m7i", "m6i"],
        ARM_AND_AMD,
        SPOT_AND_ON_DEMAND,
        &[
            "Batch/job workloads: mixed general and compute families with Spot for lowest cost",
            "Karpenter consolidation terminates idle nodes between job runs",
        ],
    ),
    row(
        Provider::Aws,
        Cost,
        &[General, Unknown],
        &["m7g", "m6g", "m7i", "m6i", "m6a"],
        ARM_AND_AMD,
        SPOT_AND_ON_DEMAND,
        &[
            "General-purpose workloads: latest Graviton and Intel m-series",
            "arm64 (Graviton) included for ~20% better price/performance on Spot",
        ],
    ),
    // AWS EKS, performance
    row(
        Provider::Aws,
        Performance,
        &[Gpu],
        &["p4d", "p3", "g5", "g4dn"],
        AMD_ONLY,
        ON_DEMAND,
        &[
            "GPU workloads detected: high-performance NVIDIA GPU families (p4d/p3/g5)",
            "On-demand only to guarantee availability and avoid interruption",
        ],
    ),
    row(
        Provider::Aws,
        Performance,
        &[Memory],
        &["r7i", "r6i", "r5n", "x2idn"],
        AMD_ONLY,
        ON_DEMAND,
        &[
            "Memory-intensive workloads: Intel memory-optimised (r7i/r6i/x2idn)",
            "On-demand ensures consistent availability for stateful and memory-bound services",
        ],
    ),
    Row {
        batch_families: &["c6a"],
        ..row(
            Provider::Aws,
            Performance,
            &[Cpu],
            &["c7i", "c6i", "c5n", "hpc7g"],
            AMD_ONLY,
            ON_DEMAND,
            &[
                "Compute-intensive: latest Intel c7i/c6i compute-optimised",
                "c5n/hpc7g for network and HPC workloads if applicable",
            ],
        )
    },
    row(
        Provider::Aws,
        Performance,
        DEFAULT_ARCHETYPES,
        &["m7i", "c7i", "m6i", "c6i"],
        AMD_ONLY,
        ON_DEMAND,
        &[
            "High-performance general: latest-gen Intel m7i/c7i on-demand",
            "No Spot to eliminate interruptions for latency-sensitive services",
        ],
    ),
    // AWS EKS, balanced
    row(
        Provider::Aws,
        Balanced,
        &[Gpu],
        &["g5", "g5g", "g4dn", "p3"],
        ARM_AND_AMD,
        SPOT_AND_ON_DEMAND,
        &["GPU workloads: balanced mix of GPU families, Spot + on-demand"],
    ),
    row(
        Provider::Aws,
        Balanced,
        &[Memory],
        &["r7g", "r7i", "r6g", "r6i", "m7g", "m7i"],
        ARM_AND_AMD,
        SPOT_AND_ON_DEMAND,
        &["Memory workloads: balanced mix of memory-optimised families"],
    ),
    row(
        Provider::Aws,
        Balanced,
        &[Cpu],
        &["c7g", "c7i", "m7g", "m7i", "c6g", "c6i"],
        ARM_AND_AMD,
        SPOT_AND_ON_DEMAND,
        &["Compute workloads: balanced compute and general families"],
    ),
    row(
        Provider::Aws,
        Balanced,
        DEFAULT_ARCHETYPES,
        &["m7g", "m7i", "c7g", "c7i", "m6g", "m6i"],
        ARM_AND_AMD,
        SPOT_AND_ON_DEMAND,
        &["Balanced: mixed Graviton and Intel latest-gen, Spot + on-demand"],
    ),
    // Azure AKS, cost. SKU families: D general, F compute, E memory, N GPU
    row(
        Provider::Azure,
        Cost,
        &[Gpu],
        &["NC", "ND"],
        AMD_ONLY,
        SPOT_AND_ON_DEMAND,
        &["GPU workloads: NC/ND series Azure GPU VMs with Spot pricing"],
    ),
    row(
        Provider::Azure,
        Cost,
        &[Memory],
        &["E", "M"],
        AMD_ONLY,
        SPOT_AND_ON_DEMAND,
        &["Memory workloads: memory-optimised E-series on Spot"],
    ),
    row(
        Provider::Azure,
        Cost,
        &[Cpu],
        &["F", "FX"],
        AMD_ONLY,
        SPOT_AND_ON_DEMAND,
        &["Compute workloads: compute-optimised F-series on Spot"],
    ),
    row(
        Provider::Azure,
        Cost,
        DEFAULT_ARCHETYPES,
        &["D", "Das", "Dads"],
        AMD_ONLY,
        SPOT_AND_ON_DEMAND,
        &["General: Dadsv5 (AMD) / Dasv5 for best $/vCPU on Azure Spot"],
    ),
    // Azure AKS, performance
    row(
        Provider::Azure,
        Performance,
        &[Gpu],
        &["NC", "NCv3", "ND", "NDv2"],
        AMD_ONLY,
        ON_DEMAND,
        &["GPU: high-end NC/ND series (V100/A100) on-demand"],
    ),
    row(
        Provider::Azure,
        Performance,
        &[Memory],
        &["E", "M", "MediumMemory"],
        AMD_ONLY,
        ON_DEMAND,
        &["Memory: E-series and M-series (up to 4 TiB RAM) on-demand"],
    ),
    row(
        Provider::Azure,
        Performance,
        &[Cpu],
        &["Fx", "FX", "Fs"],
        AMD_ONLY,
        ON_DEMAND,
        &["Compute: Fx-series (Intel Sapphire Rapids) on-demand"],
    ),
    row(
        Provider::Azure,
        Performance,
        DEFAULT_ARCHETYPES,
        &["D", "Ds", "Dls"],
        AMD_ONLY,
        ON_DEMAND,
        &["High-perf general: Dv5-series (Intel) on-demand"],
    ),
    // Azure AKS, balanced
    row(
        Provider::Azure,
        Balanced,
        ALL_ARCHETYPES,
        &["D", "Das", "E", "F"],
        AMD_ONLY,
        SPOT_AND_ON_DEMAND,
        &["Balanced: D/E/F Azure families, Spot + on-demand"],
    ),
    // GCP GKE, cost. Machine families: n2/n2d general, c2/c2d compute, m2/m3 memory, a2/g2 GPU
    row(
        Provider::Gcp,
        Cost,
        &[Gpu],
        &["a2", "g2"],
        AMD_ONLY,
        SPOT_AND_ON_DEMAND,
        &["GPU: a2 (A100) / g2 (L4) with Spot pricing"],
    ),
    row(
        Provider::Gcp,
        Cost,
        &[Memory],
        &["n2d", "m3"],
        AMD_ONLY,
        SPOT_AND_ON_DEMAND,
        &["Memory: n2d (AMD, cheapest) and m3 for large memory needs"],
    ),
    row(
        Provider::Gcp,
        Cost,
        &[Cpu],
        &["c2d", "n2d"],
        AMD_ONLY,
        SPOT_AND_ON_DEMAND,
        &["Compute: c2d (AMD EPYC) for best $/vCPU on GCP Spot"],
    ),
    row(
        Provider::Gcp,
        Cost,
        DEFAULT_ARCHETYPES,
        &["n2d", "n2", "t2d"],
        AMD_ONLY,
        SPOT_AND_ON_DEMAND,
        &["General: n2d (AMD) and t2d for lowest cost on Spot"],
    ),
    // GCP GKE, performance
    row(
        Provider::Gcp,
        Performance,
        &[Gpu],
        &["a3", "a2"],
        AMD_ONLY,
        ON_DEMAND,
        &["GPU: a3 (H100) / a2 (A100) on-demand for highest throughput"],
    ),
    row(
        Provider::Gcp,
        Performance,
        &[Memory],
        &["m3", "m2"],
        AMD_ONLY,
        ON_DEMAND,
        &["Memory: m3 (Intel Sapphire Rapids) up to 30 TiB RAM"],
    ),
    row(
        Provider::Gcp,
        Performance,
        &[Cpu],
        &["c3", "c2"],
        AMD_ONLY,
        ON_DEMAND,
        &["Compute: c3 (Intel Sapphire Rapids) on-demand"],
    ),
    row(
        Provider::Gcp,
        Performance,
        DEFAULT_ARCHETYPES,
        &["n2", "c3", "n4"],
        AMD_ONLY,
        ON_DEMAND,
        &["High-perf general: n2/c3 Intel on-demand"],
    ),
    // GCP GKE, balanced
    row(
        Provider::Gcp,
        Balanced,
        ALL_ARCHETYPES,
        &["n2", "n2d", "c2d"],
        AMD_ONLY,
        SPOT_AND_ON_DEMAND,
        &["Balanced: n2 (Intel), n2d (AMD) and c2d, Spot + on-demand"],
    ),
];

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Cells of the table that are missing or empty
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("policy table has {} empty cell(s): {}", .0.len(), describe_keys(.0))]
pub struct PolicyGaps(pub Vec<PolicyKey>);

fn describe_keys(keys: &[PolicyKey]) -> String {
    keys.iter()
        .map(|(provider, mode, archetype)| format!("{provider}/{mode}/{archetype}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read-only selection policy keyed by `(provider, mode, archetype)`
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    cells: HashMap<PolicyKey, PolicyCell>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The embedded policy for every supported provider
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for row in BUILTIN_ROWS {
            let cell = PolicyCell {
                families: owned(row.families),
                architectures: owned(row.architectures),
                capacity_types: owned(row.capacity_types),
                reasoning: owned(row.reasoning),
                batch_families: owned(row.batch_families),
            };
            for &archetype in row.archetypes {
                table.insert((row.provider, row.mode, archetype), cell.clone());
            }
        }
        table
    }

    pub fn insert(&mut self, key: PolicyKey, cell: PolicyCell) {
        self.cells.insert(key, cell);
    }

    pub fn cell(&self, provider: Provider, mode: OptimizationMode, archetype: WorkloadArchetype) -> Option<&PolicyCell> {
        self.cells.get(&(provider, mode, archetype))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Check that every supported provider has a non-empty cell for every
    /// mode and archetype
    pub fn validate(&self) -> Result<(), PolicyGaps> {
        let mut gaps = Vec::new();
        for provider in Provider::SUPPORTED {
            for mode in OptimizationMode::ALL {
                for archetype in WorkloadArchetype::ALL {
                    let filled = self
                        .cell(provider, mode, archetype)
                        .map(|cell| !cell.is_empty())
                        .unwrap_or(false);
                    if !filled {
                        gaps.push((provider, mode, archetype));
                    }
                }
            }
        }

        if gaps.is_empty() {
            Ok(())
        } else {
            Err(PolicyGaps(gaps))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_no_gaps() {
        let table = PolicyTable::builtin();
        assert!(table.validate().is_ok());
        assert_eq!(table.len(), 3 * 3 * 6);
    }

    #[test]
    fn test_reasoning_length() {
        let table = PolicyTable::builtin();
        for provider in Provider::SUPPORTED {
            for mode in OptimizationMode::ALL {
                for archetype in WorkloadArchetype::ALL {
                    let cell = table.cell(provider, mode, archetype).unwrap();
                    assert!((1..=3).contains(&cell.reasoning.len()), "{provider}/{mode}/{archetype}");
                }
            }
        }
    }

    #[test]
    fn test_unknown_provider_has_no_cells() {
        let table = PolicyTable::builtin();
        assert!(table.cell(Provider::Unknown, Balanced, General).is_none());
    }

    #[test]
    fn test_validate_reports_gaps() {
        let mut table = PolicyTable::builtin();
        table.insert(
            (Provider::Gcp, Cost, Memory),
            PolicyCell {
                families: vec![],
                architectures: owned(AMD_ONLY),
                capacity_types: owned(ON_DEMAND),
                reasoning: owned(&["empty"]),
                batch_families: vec![],
            },
        );

        let err = table.validate().unwrap_err();
        assert_eq!(err.0, vec![(Provider::Gcp, Cost, Memory)]);
        assert!(err.to_string().contains("gcp/cost/memory"));

        let gaps = PolicyTable::new().validate().unwrap_err();
        assert_eq!(gaps.0.len(), 54);
    }

    #[test]
    fn test_cost_memory_is_arm_first() {
        let table = PolicyTable::builtin();
        let cell = table.cell(Provider::Aws, Cost, Memory).unwrap();
        assert_eq!(cell.families[0], "r7g");
        assert_eq!(cell.architectures, vec!["arm64", "amd64"]);
        assert_eq!(cell.capacity_types, vec!["spot", "on-demand"]);
    }

    #[test]
    fn test_batch_families_only_on_performance_cpu() {
        let table = PolicyTable::builtin();
        for provider in Provider::SUPPORTED {
            for mode in OptimizationMode::ALL {
                for archetype in WorkloadArchetype::ALL {
                    let cell = table.cell(provider, mode, archetype).unwrap();
                    let expected = provider == Provider::Aws && mode == Performance && archetype == Cpu;
                    assert_eq!(!cell.batch_families.is_empty(), expected);
                }
            }
        }
    }
}
