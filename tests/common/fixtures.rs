use std::path::PathBuf;

use rosa_roles::cli::Mode;
use rosa_roles::compat::Topology;
use rosa_roles::creator::{AccountRolesInput, Creator};
use rosa_roles::roles::{self, AccountRoleType};
use rosa_roles::tags::{self, Tags};
use rosa_roles::UpgradeOptions;

use super::mock_iam::{ACCOUNT_ID, MockIamClients};

pub const PREFIX: &str = "ManagedOpenShift";

pub fn input(version: &str) -> AccountRolesInput {
  AccountRolesInput {
    prefix: PREFIX.to_string(),
    permissions_boundary: None,
    account_id: ACCOUNT_ID.to_string(),
    partition: "aws".to_string(),
    env: "production".to_string(),
    policy_version: version.to_string(),
    path: "/".to_string(),
    force_policy_creation: false,
  }
}

pub fn upgrade_options(version: &str, topology: Topology, mode: Mode) -> UpgradeOptions {
  UpgradeOptions {
    input: input(version),
    topology,
    mode,
    output_dir: PathBuf::from("."),
    quiet: true,
  }
}

pub fn make_tags(pairs: &[(&str, &str)]) -> Tags {
  pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn role_name(role: AccountRoleType) -> String {
  roles::role_name(PREFIX, role, Topology::Classic)
}

pub fn policy_arn(role: AccountRoleType) -> String {
  roles::policy_arn("aws", ACCOUNT_ID, "/", &roles::policy_name(&role_name(role)))
}

/// Classic account roles with customer managed policies, all tagged with `version`
pub fn classic_account(version: &str) -> MockIamClients {
  let mock = MockIamClients::default();

  for role in roles::account_roles(Topology::Classic) {
    let role_tags = Creator::UnmanagedPolicies.role_tags(*role, &input(version));
    mock.insert_role(&role_name(*role), role_tags.clone(), None);

    let arn = policy_arn(*role);
    mock.insert_policy(&arn, &roles::policy_name(&role_name(*role)), role_tags);
    mock.state.lock().unwrap().roles.get_mut(&role_name(*role)).unwrap().attached.push(arn);
  }

  mock
}

/// Hosted control plane account roles backed by AWS managed policies
pub fn hosted_cp_account(version: &str) -> MockIamClients {
  let mock = MockIamClients::default();

  for role in roles::account_roles(Topology::HostedControlPlane) {
    let role_tags = Creator::HostedCpManagedPolicies.role_tags(*role, &input(version));
    mock.insert_role(&roles::role_name(PREFIX, *role, Topology::HostedControlPlane), role_tags, None);
  }

  mock
}

/// Replace the version tag of one role
pub fn set_version_tag(mock: &MockIamClients, role: &str, version: &str) {
  let mut state = mock.state.lock().unwrap();
  let role = state.roles.get_mut(role).unwrap();
  role.tags.insert(tags::OPENSHIFT_VERSION.to_string(), version.to_string());
}

/// Replace the version tag of one customer managed policy
pub fn set_policy_version_tag(mock: &MockIamClients, policy_arn: &str, version: &str) {
  let mut state = mock.state.lock().unwrap();
  let policy = state.policies.get_mut(policy_arn).unwrap();
  policy.tags.insert(tags::OPENSHIFT_VERSION.to_string(), version.to_string());
}
