//! Concurrent multi-cluster status inspection
//!
//! [`Inspector::inspect`] fans out one inspection pipeline per context under a
//! concurrency bound and returns one [`ClusterStatus`] per input context, in
//! input order. Each pipeline runs:
//!
//! `Pending -> DetectingProvider -> FetchingVersion -> DetectingController -> CheckingCompatibility -> Done`
//!
//! Any step may end the pipeline in `Error`; the failure is recorded in that
//! cluster's status and never affects the others.

use crate::cluster::{detect_controller, identify, ClusterSource, Provider, SourceError, SupportLevel};
use crate::compat::{ReleaseError, Resolver};
use crate::observability::{self, InspectionMetrics};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};


/// Default number of simultaneously inspected clusters
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Default deadline for each cluster API step (provider, version, controller)
pub const DEFAULT_VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised by an inspection
#[derive(Debug, Clone, thiserror::Error)]
pub enum InspectError {
    #[error("timeout after {millis}ms")]
    Timeout { millis: u128 },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Releases(#[from] ReleaseError),

    #[error("inspection cancelled")]
    Cancelled,
}

/// Inspector tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectorConfig {
    /// Maximum inspections in flight at once
    pub max_in_flight: usize,
    /// Deadline for each cluster API step of one inspection
    pub version_timeout: Duration,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            version_timeout: DEFAULT_VERSION_TIMEOUT,
        }
    }
}

/// Per-cluster inspection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStage {
    Pending,
    DetectingProvider,
    FetchingVersion,
    DetectingController,
    CheckingCompatibility,
    Done,
    Error,
}

impl InspectionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionStage::Pending => "pending",
            InspectionStage::DetectingProvider => "detecting_provider",
            InspectionStage::FetchingVersion => "fetching_version",
            InspectionStage::DetectingController => "detecting_controller",
            InspectionStage::CheckingCompatibility => "checking_compatibility",
            InspectionStage::Done => "done",
            InspectionStage::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InspectionStage::Done | InspectionStage::Error)
    }
}

impl fmt::Display for InspectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one cluster, as served by the JSON status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub context: String,
    pub provider: Provider,
    pub support_level: SupportLevel,
    #[serde(default)]
    pub k8s_version: String,
    #[serde(default)]
    pub controller_installed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_version: Option<String>,
    /// `None` when compatibility was not checked
    #[serde(default)]
    pub compatible: Option<bool>,
    #[serde(default)]
    pub upgrade_available: bool,
    /// Newest compatible release; an install hint when the controller is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_compatible: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_compatible: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClusterStatus {
    /// A status with nothing inspected yet
    pub fn pending(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            provider: Provider::Unknown,
            support_level: SupportLevel::Unsupported,
            k8s_version: String::new(),
            controller_installed: false,
            controller_version: None,
            compatible: None,
            upgrade_available: false,
            latest_compatible: None,
            min_compatible: None,
            error: None,
        }
    }

    /// A status that failed before any step produced data
    pub fn failed(context: impl Into<String>, error: impl Into<String>) -> Self {
        let mut status = Self::pending(context);
        status.error = Some(error.into());
        status
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Presentation state. Errors are always distinct from incompatibility.
    pub fn badge(&self) -> StatusBadge {
        if self.error.is_some() {
            StatusBadge::Error
        } else if !self.controller_installed {
            StatusBadge::NotInstalled
        } else if self.compatible == Some(false) {
            StatusBadge::Incompatible
        } else if self.upgrade_available {
            StatusBadge::UpgradeAvailable
        } else if self.compatible == Some(true) {
            StatusBadge::Installed
        } else {
            StatusBadge::Unchecked
        }
    }
}

/// Display state of a cluster status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBadge {
    Error,
    NotInstalled,
    Incompatible,
    UpgradeAvailable,
    Installed,
    /// Installed, but compatibility is not checked for this provider
    Unchecked,
}

impl fmt::Display for StatusBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusBadge::Error => "error",
            StatusBadge::NotInstalled => "not installed",
            StatusBadge::Incompatible => "incompatible",
            StatusBadge::UpgradeAvailable => "upgrade available",
            StatusBadge::Installed => "installed",
            StatusBadge::Unchecked => "unchecked",
        };
        f.write_str(s)
    }
}

/// Release list fetched at most once per batch
type SharedReleases = Arc<OnceCell<Result<Vec<Version>, ReleaseError>>>;

/// Inspects many clusters concurrently
#[derive(Clone)]
pub struct Inspector {
    source: Arc<dyn ClusterSource>,
    resolver: Resolver,
    config: InspectorConfig,
    metrics: InspectionMetrics,
}

impl Inspector {
    pub fn new(source: Arc<dyn ClusterSource>, resolver: Resolver, config: InspectorConfig) -> Self {
        Self {
            source,
            resolver,
            config,
            metrics: InspectionMetrics::new(),
        }
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Inspect every context. Returns exactly one status per context, in
    /// input order, regardless of completion order or failures.
    pub async fn inspect(&self, contexts: &[String]) -> Vec<ClusterStatus> {
        self.run_batch(contexts).await
    }

    /// Like [`Inspector::inspect`], but gives up when `shutdown` resolves first.
    /// In-flight inspections are aborted and their results discarded.
    pub async fn inspect_until<F>(&self, contexts: &[String], shutdown: F) -> Result<Vec<ClusterStatus>, InspectError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            statuses = self.run_batch(contexts) => Ok(statuses),
            _ = shutdown => {
                warn!(clusters = contexts.len(), "Inspection cancelled, abandoning in-flight clusters");
                Err(InspectError::Cancelled)
            }
        }
    }

    /// Inspect a single context without a concurrency bound
    pub async fn inspect_one(&self, context: &str) -> ClusterStatus {
        self.task().run(context.to_string()).await
    }

    fn task(&self) -> InspectionTask {
        InspectionTask {
            source: Arc::clone(&self.source),
            resolver: self.resolver.clone(),
            releases: Arc::new(OnceCell::new()),
            version_timeout: self.config.version_timeout,
            metrics: self.metrics.clone(),
        }
    }

    async fn run_batch(&self, contexts: &[String]) -> Vec<ClusterStatus> {
        let started = Instant::now();
        let max_in_flight = self.config.max_in_flight.max(1);
        observability::log_batch_started(contexts.len(), max_in_flight);

        let semaphore = Arc::new(Semaphore::new(max_in_flight));
        let task = self.task();
        // Dropping the set (e.g. on cancellation) aborts every spawned inspection
        let mut tasks = JoinSet::new();

        for (index, context) in contexts.iter().enumerate() {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let task = task.clone();
            let context = context.clone();
            tasks.spawn(async move {
                let _permit = permit;
                (index, task.run(context).await)
            });
        }

        let mut slots: Vec<Option<ClusterStatus>> = vec![None; contexts.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, status)) => slots[index] = Some(status),
                Err(e) => warn!(error = %e, "Inspection task failed"),
            }
        }

        let statuses: Vec<ClusterStatus> = slots
            .into_iter()
            .zip(contexts)
            .map(|(slot, context)| slot.unwrap_or_else(|| ClusterStatus::failed(context.as_str(), "inspection aborted")))
            .collect();

        let failed = statuses.iter().filter(|s| s.is_error()).count();
        observability::log_batch_finished(statuses.len(), failed, started.elapsed());
        statuses
    }
}

/// Everything one inspection needs, cheap to clone into a spawned task
#[derive(Clone)]
struct InspectionTask {
    source: Arc<dyn ClusterSource>,
    resolver: Resolver,
    releases: SharedReleases,
    version_timeout: Duration,
    metrics: InspectionMetrics,
}

fn enter(context: &str, stage: InspectionStage) {
    debug!(context, stage = %stage, "Inspection stage");
}

impl InspectionTask {
    async fn run(self, context: String) -> ClusterStatus {
        let started = Instant::now();
        let _in_flight = self.metrics.track_in_flight();

        let status = self.pipeline(&context).await;

        let outcome = if status.is_error() {
            InspectionStage::Error
        } else {
            InspectionStage::Done
        };
        enter(&context, outcome);
        self.metrics.observe_inspection(outcome.as_str(), started.elapsed());
        status
    }

    async fn pipeline(&self, context: &str) -> ClusterStatus {
        let mut status = ClusterStatus::pending(context);
        enter(context, InspectionStage::Pending);

        enter(context, InspectionStage::DetectingProvider);
        let identity = match self.with_deadline(identify(self.source.as_ref(), context)).await {
            Ok(identity) => identity,
            Err(e) => {
                status.error = Some(format!("cluster unreachable: {e}"));
                return status;
            }
        };
        status.provider = identity.provider;
        status.support_level = identity.support_level;

        enter(context, InspectionStage::FetchingVersion);
        match self.server_version(context).await {
            Ok(version) => status.k8s_version = version,
            Err(e) => {
                status.error = Some(format!("cluster unreachable: {e}"));
                return status;
            }
        }

        enter(context, InspectionStage::DetectingController);
        let install = self
            .with_deadline(detect_controller(self.source.as_ref(), context))
            .await
            .and_then(|result| result.map_err(InspectError::from));
        match install {
            Ok(install) => {
                status.controller_installed = install.installed;
                status.controller_version = install.version;
            }
            Err(e) => {
                status.error = Some(format!("controller detection failed: {e}"));
                return status;
            }
        }

        // Compatibility data only exists for the AWS provider
        if status.provider != Provider::Aws {
            return status;
        }

        enter(context, InspectionStage::CheckingCompatibility);
        self.check_compatibility(&mut status).await;
        status
    }

    async fn server_version(&self, context: &str) -> Result<String, InspectError> {
        Ok(self.with_deadline(self.source.server_version(context)).await??)
    }

    /// Bound one cluster call by the per-cluster deadline
    async fn with_deadline<T>(&self, call: impl Future<Output = T>) -> Result<T, InspectError> {
        tokio::time::timeout(self.version_timeout, call)
            .await
            .map_err(|_| InspectError::Timeout {
                millis: self.version_timeout.as_millis(),
            })
    }

    async fn check_compatibility(&self, status: &mut ClusterStatus) {
        let cluster_version = status.k8s_version.clone();
        status.min_compatible = self
            .resolver
            .min_compatible_controller(&cluster_version)
            .map(|v| v.to_string());

        let installed = if status.controller_installed {
            let installed = status.controller_version.clone().unwrap_or_default();
            status.compatible = Some(self.resolver.is_compatible(&installed, &cluster_version));
            crate::compat::parse_version(&installed)
        } else {
            None
        };

        let available = match self.releases().await {
            Ok(available) => available,
            Err(e) => {
                status.error = Some(format!("release index unavailable: {}", InspectError::from(e)));
                return;
            }
        };

        let compatible = self.resolver.compatible_among(&cluster_version, available);
        if let (Some(best), Some(installed)) = (&compatible.best, &installed) {
            status.upgrade_available = best > installed;
        }
        status.latest_compatible = compatible.best.map(|v| v.to_string());
    }

    /// The release index, fetched once and shared by every cluster of the batch
    async fn releases(&self) -> Result<Vec<Version>, ReleaseError> {
        self.releases
            .get_or_init(|| async {
                let fetched = self.resolver.fetch_latest_releases().await;
                if let Err(e) = &fetched {
                    warn!(error = %e, "Release index fetch failed");
                    self.metrics.inc_release_fetch_errors();
                }
                fetched
            })
            .await
            .clone()
    }
}
