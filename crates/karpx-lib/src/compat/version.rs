//! Version string coercion
//!
//! Every comparison in the resolver goes through [`parse_version`], so a
//! version that fails to parse here is treated the same way everywhere.

use semver::Version;

/// Coerce a loosely formatted version into `MAJOR.MINOR.PATCH`.
///
/// Strips a leading `v`, discards anything from the first `-` or `+`
/// (pre-release and build metadata such as `-eks-a1b2c3`), zero-fills
/// missing components and drops components past the third.
pub fn normalize_version(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let core = match trimmed.find(['-', '+']) {
        Some(idx) => &trimmed[..idx],
        None => trimmed,
    };

    let mut parts: Vec<&str> = core.split('.').take(3).collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    parts.join(".")
}

/// Parse a loosely formatted version, returning `None` when it is not a
/// valid version after normalization.
pub fn parse_version(raw: &str) -> Option<Version> {
    Version::parse(&normalize_version(raw)).ok()
}
