//! Decides whether an existing role or policy already satisfies a target OpenShift version
//!
//! The decision only reads tags. Writing new policy versions or tags is left to the caller

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  tags::{self, Tags},
  version::{self, VersionError},
};

/// Cluster topology the account roles are meant to serve
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
  Classic,
  HostedControlPlane,
}

impl Topology {
  pub fn from_hosted_cp(hosted_cp: bool) -> Self {
    if hosted_cp {
      Topology::HostedControlPlane
    } else {
      Topology::Classic
    }
  }

  pub fn is_hosted_cp(&self) -> bool {
    matches!(self, Topology::HostedControlPlane)
  }
}

impl fmt::Display for Topology {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Topology::Classic => write!(f, "classic"),
      Topology::HostedControlPlane => write!(f, "hosted control plane"),
    }
  }
}

/// A version tag exists but cannot be compared
///
/// Usually a corrupted or hand edited tag; fatal for the one resource it names
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unable to determine compatibility of '{resource}': {source}")]
pub struct CompatibilityError {
  pub resource: String,
  #[source]
  pub source: VersionError,
}

/// Outcome of evaluating one role or policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityResult {
  pub resource: String,
  pub compatible: bool,
}

/// Returns whether a resource tagged with `tags` is compatible with `target_version` on `topology`
///
/// - Without managed policies the version tag decides; a missing tag is never compatible
/// - With managed policies the version is ignored, but the policy set must match the topology
pub fn is_compatible(
  tags: &Tags,
  role_type: &str,
  target_version: &str,
  topology: Topology,
) -> Result<bool, CompatibilityError> {
  decide(tags, target_version, topology).map_err(|source| CompatibilityError {
    resource: role_type.to_string(),
    source,
  })
}

/// Evaluate a named resource, keeping its identifier alongside the decision
pub fn evaluate(
  resource: &str,
  tags: &Tags,
  target_version: &str,
  topology: Topology,
) -> Result<CompatibilityResult, CompatibilityError> {
  let compatible = decide(tags, target_version, topology).map_err(|source| CompatibilityError {
    resource: resource.to_string(),
    source,
  })?;

  Ok(CompatibilityResult {
    resource: resource.to_string(),
    compatible,
  })
}

fn decide(tags: &Tags, target_version: &str, topology: Topology) -> Result<bool, VersionError> {
  if !tags::has_managed_policies(tags) {
    return match tags::extract_version(tags) {
      Some(current) => version::is_major_minor_compatible(current, target_version),
      None => Ok(false),
    };
  }

  if tags::has_hosted_cp_policies(tags) != topology.is_hosted_cp() {
    return Ok(false);
  }

  Ok(true)
}

/// Whether a customer managed policy already carries a version at or above `target_version`
///
/// Policies are compared on the full version, unlike roles which only track the release train
pub fn is_policy_compatible(tags: &Tags, policy_arn: &str, target_version: &str) -> Result<bool, CompatibilityError> {
  match tags::extract_version(tags) {
    Some(current) => version::is_greater_or_equal(current, target_version).map_err(|source| CompatibilityError {
      resource: policy_arn.to_string(),
      source,
    }),
    None => Ok(false),
  }
}
