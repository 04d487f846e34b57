//! Embedded Karpenter ↔ Kubernetes compatibility matrix
//!
//! Mirrors the upstream compatibility page at
//! <https://karpenter.sh/docs/upgrading/compatibility/>. Keep the table in
//! sync with upstream when new Karpenter minor lines ship.

use super::version::parse_version;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static SHARED_MATRIX: OnceLock<CompatMatrix> = OnceLock::new();

/// Half-open range of controller versions: `>= min, < max_exclusive`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerRange {
    pub min: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_exclusive: Option<Version>,
}

impl ControllerRange {
    pub fn new(min: Version, max_exclusive: Option<Version>) -> Self {
        Self { min, max_exclusive }
    }

    /// Returns true if the version falls inside this range
    pub fn contains(&self, version: &Version) -> bool {
        if *version < self.min {
            return false;
        }
        match &self.max_exclusive {
            Some(max) => version < max,
            None => true,
        }
    }

    /// Smallest controller version admitted by the range
    pub fn lower_bound(&self) -> &Version {
        &self.min
    }
}

impl fmt::Display for ControllerRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.max_exclusive {
            Some(max) => write!(f, ">={}, <{}", self.min, max),
            None => write!(f, ">={}", self.min),
        }
    }
}

/// One row of the matrix: controller versions in `controller_range` support
/// Kubernetes versions in `[cluster_min, cluster_max]` (inclusive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRule {
    pub controller_range: ControllerRange,
    pub cluster_min: Version,
    pub cluster_max: Version,
}

impl CompatibilityRule {
    pub fn new(controller_range: ControllerRange, cluster_min: Version, cluster_max: Version) -> Self {
        Self {
            controller_range,
            cluster_min,
            cluster_max,
        }
    }

    /// Returns true if the cluster version is inside this rule's supported window
    pub fn supports_cluster(&self, cluster: &Version) -> bool {
        *cluster >= self.cluster_min && *cluster <= self.cluster_max
    }
}

/// Ordered, immutable set of compatibility rules.
///
/// Rules are consulted in declaration order and the first rule whose
/// controller range contains a version is authoritative for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatMatrix {
    rules: Vec<CompatibilityRule>,
}

impl Default for CompatMatrix {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CompatMatrix {
    /// Build a matrix from explicit rules, preserving their order
    pub fn from_rules(rules: Vec<CompatibilityRule>) -> Self {
        Self { rules }
    }

    /// The matrix shipped with this release
    pub fn builtin() -> Self {
        let row = |min: (u64, u64), max: Option<(u64, u64)>, k8s_min: u64, k8s_max: u64| {
            CompatibilityRule::new(
                ControllerRange::new(
                    Version::new(min.0, min.1, 0),
                    max.map(|(major, minor)| Version::new(major, minor, 0)),
                ),
                Version::new(1, k8s_min, 0),
                Version::new(1, k8s_max, 99),
            )
        };

        Self::from_rules(vec![
            // Karpenter 1.4.x+
            row((1, 4), Some((2, 0)), 29, 33),
            // Karpenter 1.2.x - 1.3.x
            row((1, 2), Some((1, 4)), 29, 32),
            // Karpenter 1.0.x - 1.1.x
            row((1, 0), Some((1, 2)), 28, 31),
            // Karpenter 0.37.x
            row((0, 37), Some((1, 0)), 27, 30),
            // Karpenter 0.35.x - 0.36.x
            row((0, 35), Some((0, 37)), 27, 29),
            // Karpenter 0.33.x - 0.34.x
            row((0, 33), Some((0, 35)), 26, 28),
        ])
    }

    /// Process-wide builtin matrix, initialized on first use
    pub fn shared() -> &'static CompatMatrix {
        SHARED_MATRIX.get_or_init(Self::builtin)
    }

    pub fn rules(&self) -> &[CompatibilityRule] {
        &self.rules
    }

    /// The authoritative rule for a controller version, if any
    pub fn rule_for(&self, controller: &Version) -> Option<&CompatibilityRule> {
        self.rules
            .iter()
            .find(|rule| rule.controller_range.contains(controller))
    }

    /// Whether a controller version supports a cluster version.
    ///
    /// Unparseable input on either side and controller versions not covered
    /// by any rule both yield `false`.
    pub fn is_compatible(&self, controller_version: &str, cluster_version: &str) -> bool {
        match (parse_version(controller_version), parse_version(cluster_version)) {
            (Some(controller), Some(cluster)) => self.is_compatible_version(&controller, &cluster),
            _ => false,
        }
    }

    pub fn is_compatible_version(&self, controller: &Version, cluster: &Version) -> bool {
        self.rule_for(controller)
            .map(|rule| rule.supports_cluster(cluster))
            .unwrap_or(false)
    }

    /// Compatible subset of `candidates`, newest first, without duplicates.
    /// Candidates that do not parse are skipped.
    pub fn filter_compatible<S: AsRef<str>>(&self, cluster_version: &str, candidates: &[S]) -> Vec<Version> {
        let Some(cluster) = parse_version(cluster_version) else {
            return Vec::new();
        };
        let versions = candidates.iter().filter_map(|c| parse_version(c.as_ref()));
        self.filter_compatible_versions(&cluster, versions)
    }

    pub fn filter_compatible_versions(
        &self,
        cluster: &Version,
        candidates: impl IntoIterator<Item = Version>,
    ) -> Vec<Version> {
        let mut compatible: Vec<Version> = candidates
            .into_iter()
            .filter(|v| self.is_compatible_version(v, cluster))
            .collect();
        compatible.sort_by(|a, b| b.cmp(a));
        compatible.dedup();
        compatible
    }

    /// Smallest controller version that supports the cluster version,
    /// derived from the matrix alone. `None` when no rule covers it.
    pub fn min_compatible_controller(&self, cluster_version: &str) -> Option<Version> {
        let cluster = parse_version(cluster_version)?;
        self.rules
            .iter()
            .filter(|rule| rule.supports_cluster(&cluster))
            .map(|rule| rule.controller_range.lower_bound())
            .min()
            .cloned()
    }
}
