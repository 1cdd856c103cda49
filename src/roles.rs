use std::{fmt, sync::LazyLock};

use anyhow::{Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::compat::Topology;

/// IAM names are limited to 64 characters
const MAX_NAME_LENGTH: usize = 64;

/// Prefixes leave room for the longest role and policy suffixes
const MAX_PREFIX_LENGTH: usize = 32;

static ROLE_NAME_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[\w+=,.@-]+$").expect("role name pattern is valid"));

/// AWS accounts hosting the installer jump role in each OCM environment
pub const JUMP_ACCOUNTS: &[(&str, &str)] = &[
  ("production", "710019948333"),
  ("staging", "644306948063"),
  ("integration", "896164604406"),
];

/// The account-wide roles a cluster is installed and operated with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRoleType {
  Installer,
  Support,
  ControlPlane,
  Worker,
}

const CLASSIC_ROLES: &[AccountRoleType] = &[
  AccountRoleType::Installer,
  AccountRoleType::Support,
  AccountRoleType::ControlPlane,
  AccountRoleType::Worker,
];

// Hosted control planes run the control plane outside the customer account
const HCP_ROLES: &[AccountRoleType] = &[
  AccountRoleType::Installer,
  AccountRoleType::Support,
  AccountRoleType::Worker,
];

impl AccountRoleType {
  /// Value stored under the `rosa_role_type` tag, also used to name policy documents
  pub fn tag_value(&self) -> &'static str {
    match self {
      AccountRoleType::Installer => "installer",
      AccountRoleType::Support => "support",
      AccountRoleType::ControlPlane => "instance_controlplane",
      AccountRoleType::Worker => "instance_worker",
    }
  }

  pub fn from_tag_value(value: &str) -> Option<Self> {
    CLASSIC_ROLES.iter().copied().find(|role| role.tag_value() == value)
  }

  /// Fragment embedded in the IAM role name
  pub fn name_fragment(&self, topology: Topology) -> &'static str {
    match (topology, self) {
      (Topology::Classic, AccountRoleType::Installer) => "Installer",
      (Topology::Classic, AccountRoleType::Support) => "Support",
      (Topology::Classic, AccountRoleType::ControlPlane) => "ControlPlane",
      (Topology::Classic, AccountRoleType::Worker) => "Worker",
      (Topology::HostedControlPlane, AccountRoleType::Installer) => "HCP-ROSA-Installer",
      (Topology::HostedControlPlane, AccountRoleType::Support) => "HCP-ROSA-Support",
      (Topology::HostedControlPlane, AccountRoleType::ControlPlane) => "HCP-ROSA-ControlPlane",
      (Topology::HostedControlPlane, AccountRoleType::Worker) => "HCP-ROSA-Worker",
    }
  }

  pub fn trust_policy_key(&self, topology: Topology) -> String {
    match topology {
      Topology::Classic => format!("sts_{}_trust_policy", self.tag_value()),
      Topology::HostedControlPlane => format!("sts_hcp_{}_trust_policy", self.tag_value()),
    }
  }

  pub fn permission_policy_key(&self, topology: Topology) -> String {
    match topology {
      Topology::Classic => format!("sts_{}_permission_policy", self.tag_value()),
      Topology::HostedControlPlane => format!("sts_hcp_{}_permission_policy", self.tag_value()),
    }
  }
}

impl fmt::Display for AccountRoleType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      AccountRoleType::Installer => write!(f, "Installer"),
      AccountRoleType::Support => write!(f, "Support"),
      AccountRoleType::ControlPlane => write!(f, "Control plane"),
      AccountRoleType::Worker => write!(f, "Worker"),
    }
  }
}

/// Account roles required by the given topology
pub fn account_roles(topology: Topology) -> &'static [AccountRoleType] {
  match topology {
    Topology::Classic => CLASSIC_ROLES,
    Topology::HostedControlPlane => HCP_ROLES,
  }
}

fn truncate(name: String) -> String {
  if name.chars().count() > MAX_NAME_LENGTH {
    name.chars().take(MAX_NAME_LENGTH).collect()
  } else {
    name
  }
}

/// `<prefix>-<fragment>-Role`, truncated to the IAM name limit
pub fn role_name(prefix: &str, role: AccountRoleType, topology: Topology) -> String {
  truncate(format!("{prefix}-{}-Role", role.name_fragment(topology)))
}

/// Name of the customer managed permission policy attached to a role
pub fn policy_name(role_name: &str) -> String {
  truncate(format!("{role_name}-Policy"))
}

pub fn role_arn(partition: &str, account_id: &str, path: &str, name: &str) -> String {
  format!("arn:{partition}:iam::{account_id}:role{path}{name}")
}

pub fn policy_arn(partition: &str, account_id: &str, path: &str, name: &str) -> String {
  format!("arn:{partition}:iam::{account_id}:policy{path}{name}")
}

pub fn jump_account(env: &str) -> Option<&'static str> {
  JUMP_ACCOUNTS.iter().find(|(name, _)| *name == env).map(|(_, account)| *account)
}

pub fn validate_prefix(prefix: &str) -> Result<()> {
  if prefix.is_empty() {
    bail!("Expected a prefix for the account roles");
  }
  if prefix.len() > MAX_PREFIX_LENGTH {
    bail!("Expected a prefix with {MAX_PREFIX_LENGTH} characters or less, got '{prefix}'");
  }
  if !ROLE_NAME_RE.is_match(prefix) {
    bail!("Expected a valid role prefix matching {}", ROLE_NAME_RE.as_str());
  }

  Ok(())
}

pub fn validate_role_name(name: &str) -> Result<()> {
  if name.len() > MAX_NAME_LENGTH || !ROLE_NAME_RE.is_match(name) {
    bail!("Role name '{name}' is invalid");
  }

  Ok(())
}

/// IAM paths are either `/` or begin and end with `/`
pub fn validate_path(path: &str) -> Result<()> {
  if path == "/" {
    return Ok(());
  }
  if !path.starts_with('/') || !path.ends_with('/') || path.contains("//") {
    bail!("Invalid IAM path '{path}': it must begin and end with '/'");
  }
  if !path.chars().all(|c| c.is_ascii_graphic()) {
    bail!("Invalid IAM path '{path}': only printable ASCII characters are allowed");
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classic_role_names() {
    let names: Vec<String> = account_roles(Topology::Classic)
      .iter()
      .map(|role| role_name("ManagedOpenShift", *role, Topology::Classic))
      .collect();

    assert_eq!(
      names,
      vec![
        "ManagedOpenShift-Installer-Role",
        "ManagedOpenShift-Support-Role",
        "ManagedOpenShift-ControlPlane-Role",
        "ManagedOpenShift-Worker-Role",
      ]
    );
  }

  #[test]
  fn hcp_roles_skip_control_plane() {
    let roles = account_roles(Topology::HostedControlPlane);
    assert_eq!(roles.len(), 3);
    assert!(!roles.contains(&AccountRoleType::ControlPlane));
    assert_eq!(
      role_name("ManagedOpenShift", AccountRoleType::Worker, Topology::HostedControlPlane),
      "ManagedOpenShift-HCP-ROSA-Worker-Role"
    );
  }

  #[test]
  fn names_are_truncated() {
    let prefix = "a".repeat(60);
    assert_eq!(role_name(&prefix, AccountRoleType::Installer, Topology::Classic).len(), 64);
    assert_eq!(policy_name(&"b".repeat(63)).len(), 64);
  }

  #[test]
  fn tag_values_round_trip() {
    for role in account_roles(Topology::Classic) {
      assert_eq!(AccountRoleType::from_tag_value(role.tag_value()), Some(*role));
    }
    assert_eq!(AccountRoleType::from_tag_value("operator"), None);
  }

  #[test]
  fn policy_keys() {
    assert_eq!(
      AccountRoleType::ControlPlane.permission_policy_key(Topology::Classic),
      "sts_instance_controlplane_permission_policy"
    );
    assert_eq!(
      AccountRoleType::Installer.trust_policy_key(Topology::HostedControlPlane),
      "sts_hcp_installer_trust_policy"
    );
  }

  #[test]
  fn arns_include_path() {
    assert_eq!(
      policy_arn("aws", "123456789012", "/", "p"),
      "arn:aws:iam::123456789012:policy/p"
    );
    assert_eq!(
      role_arn("aws-us-gov", "123456789012", "/team/", "r"),
      "arn:aws-us-gov:iam::123456789012:role/team/r"
    );
  }

  #[test]
  fn prefix_validation() {
    assert!(validate_prefix("ManagedOpenShift").is_ok());
    assert!(validate_prefix("my.team-1").is_ok());
    assert!(validate_prefix("").is_err());
    assert!(validate_prefix("has space").is_err());
    assert!(validate_prefix(&"x".repeat(33)).is_err());
  }

  #[test]
  fn path_validation() {
    assert!(validate_path("/").is_ok());
    assert!(validate_path("/team/rosa/").is_ok());
    assert!(validate_path("team/").is_err());
    assert!(validate_path("/team").is_err());
    assert!(validate_path("/a//b/").is_err());
  }

  #[test]
  fn jump_accounts() {
    assert_eq!(jump_account("production"), Some("710019948333"));
    assert_eq!(jump_account("nope"), None);
  }
}
