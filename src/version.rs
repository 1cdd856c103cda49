use semver::{BuildMetadata, Prerelease, Version, VersionReq};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
  #[error("Malformed version: {0}")]
  Malformed(String),
}

/// Parse an OpenShift version string into a semantic version
///
/// Accepts `4.14`, `4.14.3`, `v4.14.3`, `openshift-v4.14.3` and pre-release forms such
/// as `4.14.0-0.nightly-2023-10-24-225235`. A missing patch segment is treated as `0`
pub fn parse(version: &str) -> Result<Version, VersionError> {
  let malformed = || VersionError::Malformed(version.to_string());

  let trimmed = version.trim();
  let trimmed = trimmed.strip_prefix("openshift-").unwrap_or(trimmed);
  let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

  let (core, suffix) = match trimmed.find(['-', '+']) {
    Some(idx) => trimmed.split_at(idx),
    None => (trimmed, ""),
  };

  let normalized = match core.split('.').count() {
    2 => format!("{core}.0{suffix}"),
    3 => trimmed.to_string(),
    _ => return Err(malformed()),
  };

  Version::parse(&normalized).map_err(|_| malformed())
}

/// Returns true when `a >= b` using semver ordering
///
/// Identical strings are equal without being parsed, so placeholder values that are
/// not versions at all still compare equal to themselves
pub fn is_greater_or_equal(a: &str, b: &str) -> Result<bool, VersionError> {
  if a == b {
    return Ok(true);
  }

  let a = parse(a)?;
  let b = parse(b)?;

  Ok(a >= b)
}

/// Returns true when `current` is on the same or a newer major.minor release train than `target`
///
/// Roles are tagged with the minor release (`4.14`), not an exact build, so the patch
/// segment of either side never changes the outcome
pub fn is_major_minor_compatible(current: &str, target: &str) -> Result<bool, VersionError> {
  if current == target {
    return Ok(true);
  }

  let target_version = parse(target)?;
  let constraint = VersionReq::parse(&format!(">={}.{}", target_version.major, target_version.minor))
    .map_err(|_| VersionError::Malformed(target.to_string()))?;

  // Pre-release builds only satisfy a requirement naming that exact pre-release
  let mut current_version = parse(current)?;
  current_version.pre = Prerelease::EMPTY;
  current_version.build = BuildMetadata::EMPTY;

  Ok(constraint.matches(&current_version))
}

/// Reduce a version to its `major.minor` release train
///
/// For example `4.14.3` and `openshift-v4.14.0-rc.4` both return `4.14`
pub fn major_minor(version: &str) -> Result<String, VersionError> {
  let parsed = parse(version)?;
  Ok(format!("{}.{}", parsed.major, parsed.minor))
}
