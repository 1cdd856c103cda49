//! Upgrades existing account roles to a newer policy version
//!
//! Every role is inspected first. Roles are then upgraded one at a time; a failure on one
//! role is recorded against it and the remaining roles are still processed

use std::fmt;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
  clients::IamClients,
  commandbuilder::{self, Command, CommandBuilder, Param},
  compat::{self, Topology},
  creator::{self, AccountRolesInput, Creator, PolicySpec},
  error,
  policies::PolicyTemplates,
  roles::{self, AccountRoleType},
  tags::{self, Tags},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleStatus {
  /// Tags satisfy the target version
  Compatible,
  /// Customer managed policies are behind the target version
  Upgrade,
  /// Backed by managed policies for the other topology; upgrading cannot fix this
  TopologyMismatch,
  Missing,
  Error,
}

impl RoleStatus {
  pub fn is_compatible(&self) -> bool {
    matches!(self, RoleStatus::Compatible)
  }
}

impl fmt::Display for RoleStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      RoleStatus::Compatible => write!(f, "compatible"),
      RoleStatus::Upgrade => write!(f, "upgrade required"),
      RoleStatus::TopologyMismatch => write!(f, "topology mismatch"),
      RoleStatus::Missing => write!(f, "missing"),
      RoleStatus::Error => write!(f, "error"),
    }
  }
}

/// What was found for one account role
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReport {
  pub role_name: String,
  pub role_type: AccountRoleType,
  pub version: Option<String>,
  pub managed: bool,
  pub hosted_cp: bool,
  pub status: RoleStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl RoleReport {
  fn new(role_name: String, role_type: AccountRoleType) -> Self {
    RoleReport {
      role_name,
      role_type,
      version: None,
      managed: false,
      hosted_cp: false,
      status: RoleStatus::Missing,
      error: None,
    }
  }

  fn failed(mut self, err: impl fmt::Display) -> Self {
    self.status = RoleStatus::Error;
    self.error = Some(err.to_string());
    self
  }
}

/// Results of discovery for one prefix and topology
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
  pub prefix: String,
  pub target_version: String,
  pub topology: Topology,
  pub roles: Vec<RoleReport>,
}

impl Discovery {
  /// No role exists for the prefix
  pub fn is_empty(&self) -> bool {
    self.roles.iter().all(|r| r.status == RoleStatus::Missing)
  }

  pub fn is_up_to_date(&self) -> bool {
    self
      .roles
      .iter()
      .filter(|r| r.status != RoleStatus::Missing)
      .all(|r| r.status.is_compatible())
  }

  pub fn needs_upgrade(&self) -> impl Iterator<Item = &RoleReport> {
    self.roles.iter().filter(|r| r.status == RoleStatus::Upgrade)
  }

  pub fn has_errors(&self) -> bool {
    self.roles.iter().any(|r| r.status == RoleStatus::Error)
  }
}

/// Spinner shown while roles are inspected; hidden when `quiet`
pub fn build_progress_bar(len: u64, quiet: bool) -> Result<ProgressBar> {
  if quiet {
    return Ok(ProgressBar::hidden());
  }

  let progress_bar = ProgressBar::new(len);
  progress_bar.set_style(
    ProgressStyle::default_spinner()
      .template("{spinner} Inspecting account roles [{pos}/{len}] {msg}")
      .context("Failed to parse progress style template")?,
  );

  Ok(progress_bar)
}

/// Inspect every account role for `prefix` against `target_version`
pub async fn discover<C: IamClients>(
  client: &C,
  prefix: &str,
  target_version: &str,
  topology: Topology,
  progress: &ProgressBar,
) -> Discovery {
  let account_roles = roles::account_roles(topology);
  let mut reports = Vec::with_capacity(account_roles.len());

  for role in account_roles {
    let name = roles::role_name(prefix, *role, topology);
    progress.set_message(name.clone());

    reports.push(inspect(client, name, *role, target_version, topology).await);
    progress.inc(1);
  }
  progress.finish_and_clear();

  Discovery {
    prefix: prefix.to_string(),
    target_version: target_version.to_string(),
    topology,
    roles: reports,
  }
}

async fn inspect<C: IamClients>(
  client: &C,
  name: String,
  role_type: AccountRoleType,
  target_version: &str,
  topology: Topology,
) -> RoleReport {
  let mut report = RoleReport::new(name, role_type);

  let role_tags = match client.list_role_tags(&report.role_name).await {
    Ok(role_tags) => role_tags,
    Err(err) if error::is_not_found(&err) => {
      debug!("Role '{}' not found", report.role_name);
      return report;
    }
    Err(err) => {
      if error::is_throttled(&err) {
        warn!("Throttled while reading tags of '{}'", report.role_name);
      }
      return report.failed(format!("{err:#}"));
    }
  };

  report.version = tags::extract_version(&role_tags).map(str::to_string);
  report.managed = tags::has_managed_policies(&role_tags);
  report.hosted_cp = tags::has_hosted_cp_policies(&role_tags);

  match compat::evaluate(&report.role_name, &role_tags, target_version, topology) {
    Ok(result) if result.compatible => report.status = RoleStatus::Compatible,
    Ok(_) if report.managed => report.status = RoleStatus::TopologyMismatch,
    Ok(_) => report.status = RoleStatus::Upgrade,
    Err(err) => return report.failed(err),
  }

  report
}

/// Outcome of upgrading the roles discovery flagged
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeOutcome {
  pub upgraded: Vec<String>,
  pub failed: Vec<(String, String)>,
}

/// Upgrade the permission policy of every role that needs it and re-tag the role
pub async fn upgrade_roles<C: IamClients>(
  client: &C,
  templates: &PolicyTemplates,
  input: &AccountRolesInput,
  discovery: &Discovery,
) -> UpgradeOutcome {
  let mut outcome = UpgradeOutcome::default();

  for report in discovery.needs_upgrade() {
    match upgrade_role(client, templates, input, discovery.topology, report).await {
      Ok(()) => {
        info!("Upgraded policy of role '{}' to version {}", report.role_name, input.policy_version);
        outcome.upgraded.push(report.role_name.clone());
      }
      Err(err) => {
        warn!("Failed to upgrade role '{}': {err:#}", report.role_name);
        outcome.failed.push((report.role_name.clone(), format!("{err:#}")));
      }
    }
  }

  outcome
}

async fn upgrade_role<C: IamClients>(
  client: &C,
  templates: &PolicyTemplates,
  input: &AccountRolesInput,
  topology: Topology,
  report: &RoleReport,
) -> Result<()> {
  let target = PolicyTarget::resolve(client, input, topology, report).await?;

  let policy_arn = creator::ensure_policy(
    client,
    &PolicySpec {
      arn: target.policy_arn.clone(),
      name: target.policy_name.clone(),
      document: templates.render(&target.document_key, &input.permission_policy_vars())?,
      version: input.policy_version.clone(),
      tags: target.tags.clone(),
      path: target.path.clone(),
      force: input.force_policy_creation,
    },
  )
  .await?;

  let attached = client.list_attached_role_policies(&report.role_name).await?;
  if !attached.iter().any(|policy| policy.arn == policy_arn) {
    debug!("Attaching permission policy '{policy_arn}' to role '{}'", report.role_name);
    client.attach_role_policy(&report.role_name, &policy_arn).await?;
  }
  client.tag_role(&report.role_name, &target.tags).await?;

  Ok(())
}

/// Customer managed policy belonging to an existing role
struct PolicyTarget {
  policy_name: String,
  policy_arn: String,
  document_key: String,
  path: String,
  tags: Tags,
}

impl PolicyTarget {
  async fn resolve<C: IamClients>(
    client: &C,
    input: &AccountRolesInput,
    topology: Topology,
    report: &RoleReport,
  ) -> Result<Self> {
    // The policy lives under the same path as the role
    let path = match client.get_role(&report.role_name).await? {
      Some(role) => role.path,
      None => input.path.clone(),
    };

    let policy_name = roles::policy_name(&report.role_name);
    let policy_arn = roles::policy_arn(&input.partition, &input.account_id, &path, &policy_name);

    Ok(PolicyTarget {
      policy_name,
      policy_arn,
      document_key: report.role_type.permission_policy_key(topology),
      path,
      tags: Creator::UnmanagedPolicies.role_tags(report.role_type, input),
    })
  }
}

/// Commands for manual mode along with the policy documents they reference
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManualPlan {
  pub commands: String,
  pub policy_keys: Vec<String>,
}

/// Build the `aws` commands that would perform [`upgrade_roles`]
///
/// Policies are judged the same way as in auto mode: a policy already tagged at or above
/// the target version gets no new version unless `force_policy_creation` is set
pub async fn plan_manual<C: IamClients>(
  client: &C,
  input: &AccountRolesInput,
  discovery: &Discovery,
) -> Result<ManualPlan> {
  let mut commands = Vec::new();
  let mut policy_keys = Vec::new();

  for report in discovery.needs_upgrade() {
    let target = PolicyTarget::resolve(client, input, discovery.topology, report).await?;
    let document = format!("file://{}.json", target.document_key);

    let publish = match client.list_policy_tags(&target.policy_arn).await {
      Ok(current_tags) => {
        let outdated = input.force_policy_creation
          || !compat::is_policy_compatible(&current_tags, &target.policy_arn, &input.policy_version)?;
        if outdated {
          commands.push(
            CommandBuilder::iam()
              .command(Command::CreatePolicyVersion)
              .param(Param::PolicyArn, &target.policy_arn)
              .param(Param::PolicyDocument, &document)
              .switch(Param::SetAsDefault)
              .build(),
          );
          commands.push(
            CommandBuilder::iam()
              .command(Command::TagPolicy)
              .param(Param::PolicyArn, &target.policy_arn)
              .tags(&target.tags)
              .build(),
          );
        } else {
          debug!("Policy '{}' is already at version {}", target.policy_arn, input.policy_version);
        }
        outdated
      }
      Err(err) if error::is_not_found(&err) => {
        commands.push(
          CommandBuilder::iam()
            .command(Command::CreatePolicy)
            .param(Param::PolicyName, &target.policy_name)
            .param(Param::PolicyDocument, &document)
            .tags(&target.tags)
            .param(Param::Path, &target.path)
            .build(),
        );
        true
      }
      Err(err) => return Err(err),
    };

    let attached = client.list_attached_role_policies(&report.role_name).await?;
    if !attached.iter().any(|policy| policy.arn == target.policy_arn) {
      commands.push(creator::attach_role_policy_command(&report.role_name, &target.policy_arn));
    }

    commands.push(
      CommandBuilder::iam()
        .command(Command::TagRole)
        .param(Param::RoleName, &report.role_name)
        .tags(&target.tags)
        .build(),
    );

    if publish && !policy_keys.contains(&target.document_key) {
      policy_keys.push(target.document_key);
    }
  }

  Ok(ManualPlan {
    commands: commandbuilder::join_commands(&commands),
    policy_keys,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn report(status: RoleStatus) -> RoleReport {
    RoleReport {
      status,
      ..RoleReport::new("ManagedOpenShift-Installer-Role".to_string(), AccountRoleType::Installer)
    }
  }

  fn discovery(statuses: &[RoleStatus]) -> Discovery {
    Discovery {
      prefix: "ManagedOpenShift".to_string(),
      target_version: "4.14".to_string(),
      topology: Topology::Classic,
      roles: statuses.iter().map(|s| report(*s)).collect(),
    }
  }

  #[test]
  fn up_to_date_ignores_missing_roles() {
    assert!(discovery(&[RoleStatus::Compatible, RoleStatus::Missing]).is_up_to_date());
    assert!(!discovery(&[RoleStatus::Compatible, RoleStatus::Upgrade]).is_up_to_date());
    assert!(!discovery(&[RoleStatus::TopologyMismatch]).is_up_to_date());
  }

  #[test]
  fn empty_when_every_role_is_missing() {
    assert!(discovery(&[RoleStatus::Missing, RoleStatus::Missing]).is_empty());
    assert!(!discovery(&[RoleStatus::Missing, RoleStatus::Error]).is_empty());
  }

  #[test]
  fn errors_are_reported() {
    let d = discovery(&[RoleStatus::Compatible, RoleStatus::Error]);
    assert!(d.has_errors());
    assert_eq!(d.needs_upgrade().count(), 0);
  }

  #[test]
  fn failed_report_keeps_message() {
    let r = report(RoleStatus::Compatible).failed("Malformed version: x");
    assert_eq!(r.status, RoleStatus::Error);
    assert_eq!(r.error.as_deref(), Some("Malformed version: x"));
  }

  #[test]
  fn status_display() {
    assert_eq!(RoleStatus::Upgrade.to_string(), "upgrade required");
    assert_eq!(RoleStatus::TopologyMismatch.to_string(), "topology mismatch");
  }

  #[test]
  fn quiet_progress_bar_is_hidden() {
    assert!(build_progress_bar(4, true).unwrap().is_hidden());
  }
}
