//! Live Karpenter release index
//!
//! Stable releases are fetched from the GitHub Releases API. Drafts,
//! pre-releases and tags that are not valid versions (chart-only tags, for
//! example) are dropped. Fetch failures are surfaced to the caller; there is
//! no fallback list.

use super::matrix::CompatMatrix;
use super::version::parse_version;
use async_trait::async_trait;
use reqwest::Client;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default GitHub Releases endpoint for the AWS provider
pub const DEFAULT_RELEASES_URL: &str =
    "https://api.github.com/repos/aws/karpenter-provider-aws/releases?per_page=50";

/// Default timeout for one release index request
pub const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while reading the release index
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReleaseError {
    #[error("timeout after {millis}ms")]
    Timeout { millis: u128 },

    #[error("fetch Karpenter releases: {0}")]
    Network(String),

    #[error("release index returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("parse releases response: {0}")]
    Parse(String),
}

/// One record of the release index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseTag {
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
}

impl ReleaseTag {
    /// The release version, if this tag is a usable stable release
    pub fn stable_version(&self) -> Option<Version> {
        if self.prerelease || self.draft {
            return None;
        }
        // Tags carrying their own pre-release suffix are not stable either
        let bare = self.tag_name.trim().trim_start_matches('v');
        let core = bare.split('+').next().unwrap_or(bare);
        if core.contains('-') || core.split('.').count() > 3 {
            return None;
        }
        parse_version(bare)
    }
}

/// Keep the stable, valid versions from a list of release tags, in order
pub fn stable_versions(tags: &[ReleaseTag]) -> Vec<Version> {
    tags.iter().filter_map(ReleaseTag::stable_version).collect()
}

/// Source of available controller releases
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch stable controller releases, newest first as published
    async fn fetch_releases(&self) -> Result<Vec<Version>, ReleaseError>;
}

/// Release index backed by the GitHub Releases API
pub struct GithubReleases {
    client: Client,
    url: String,
    timeout: Duration,
}

impl GithubReleases {
    /// Create a client for the default upstream release index
    pub fn new() -> Result<Self, ReleaseError> {
        Self::with_url(DEFAULT_RELEASES_URL, DEFAULT_RELEASE_TIMEOUT)
    }

    /// Create a client for a custom release index URL
    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self, ReleaseError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("karpx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ReleaseError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the raw release records
    pub async fn fetch_tags(&self) -> Result<Vec<ReleaseTag>, ReleaseError> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, url = %self.url, "Release index returned an error status");
            return Err(ReleaseError::Status { status, body });
        }

        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        serde_json::from_slice(&body).map_err(|e| ReleaseError::Parse(e.to_string()))
    }

    fn request_error(&self, err: reqwest::Error) -> ReleaseError {
        if err.is_timeout() {
            ReleaseError::Timeout {
                millis: self.timeout.as_millis(),
            }
        } else {
            ReleaseError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl ReleaseSource for GithubReleases {
    async fn fetch_releases(&self) -> Result<Vec<Version>, ReleaseError> {
        let tags = self.fetch_tags().await?;
        let versions = stable_versions(&tags);
        debug!(
            tags = tags.len(),
            stable = versions.len(),
            "Fetched Karpenter release index"
        );
        Ok(versions)
    }
}

/// Compatible releases for one cluster version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompatibleReleases {
    /// Newest compatible release, `None` when nothing is compatible
    pub best: Option<Version>,
    /// Every compatible release, newest first
    pub all: Vec<Version>,
}

impl CompatibleReleases {
    pub fn from_sorted(all: Vec<Version>) -> Self {
        Self {
            best: all.first().cloned(),
            all,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Compatibility resolver: the embedded matrix combined with a live release source
#[derive(Clone)]
pub struct Resolver {
    matrix: Arc<CompatMatrix>,
    releases: Arc<dyn ReleaseSource>,
}

impl Resolver {
    pub fn new(matrix: Arc<CompatMatrix>, releases: Arc<dyn ReleaseSource>) -> Self {
        Self { matrix, releases }
    }

    pub fn matrix(&self) -> &CompatMatrix {
        &self.matrix
    }

    pub fn release_source(&self) -> Arc<dyn ReleaseSource> {
        self.releases.clone()
    }

    pub fn is_compatible(&self, controller_version: &str, cluster_version: &str) -> bool {
        self.matrix.is_compatible(controller_version, cluster_version)
    }

    pub fn min_compatible_controller(&self, cluster_version: &str) -> Option<Version> {
        self.matrix.min_compatible_controller(cluster_version)
    }

    /// Fetch the live release index
    pub async fn fetch_latest_releases(&self) -> Result<Vec<Version>, ReleaseError> {
        self.releases.fetch_releases().await
    }

    /// Newest release compatible with the cluster version plus the full
    /// compatible list. An empty result is not an error.
    pub async fn latest_compatible(&self, cluster_version: &str) -> Result<CompatibleReleases, ReleaseError> {
        let available = self.fetch_latest_releases().await?;
        Ok(self.compatible_among(cluster_version, available))
    }

    /// Filter an already fetched release list for the cluster version
    pub fn compatible_among(&self, cluster_version: &str, available: Vec<Version>) -> CompatibleReleases {
        match parse_version(cluster_version) {
            Some(cluster) => {
                CompatibleReleases::from_sorted(self.matrix.filter_compatible_versions(&cluster, available))
            }
            None => CompatibleReleases::default(),
        }
    }
}
