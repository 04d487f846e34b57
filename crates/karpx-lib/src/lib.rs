//! Decision engine for managing the Karpenter node autoscaler
//!
//! This crate provides the core functionality for:
//! - Karpenter / Kubernetes version compatibility resolution
//! - Workload profiling and classification
//! - Node pool instance recommendations per cloud provider
//! - Concurrent multi-cluster status inspection
//! - Observability for inspections

pub mod cluster;
pub mod compat;
pub mod nodes;
pub mod observability;
pub mod status;
pub mod workload;

pub use cluster::{ClusterIdentity, ClusterSource, KubeClusterSource, Provider, SupportLevel};
pub use compat::{CompatMatrix, CompatibilityRule, GithubReleases, ReleaseSource, Resolver};
pub use nodes::{OptimizationMode, Recommendation, RecommendationEngine};
pub use observability::InspectionMetrics;
pub use status::{ClusterStatus, InspectError, Inspector, InspectorConfig, StatusBadge};
pub use workload::{WorkloadArchetype, WorkloadProfile};
