//! Karpenter ↔ Kubernetes version compatibility
//!
//! The embedded [`CompatMatrix`] answers offline questions ("is this pair
//! compatible", "what is the oldest compatible controller"). The
//! [`Resolver`] combines it with a live [`ReleaseSource`] to answer "what is
//! the newest compatible controller release".

mod matrix;
mod releases;
mod version;

pub use matrix::{CompatMatrix, CompatibilityRule, ControllerRange};
pub use releases::{
    stable_versions, CompatibleReleases, GithubReleases, ReleaseError, ReleaseSource, ReleaseTag,
    Resolver, DEFAULT_RELEASES_URL, DEFAULT_RELEASE_TIMEOUT,
};
pub use version::{normalize_version, parse_version};
