use std::{
  collections::{BTreeMap, BTreeSet},
  sync::{Arc, Mutex},
};

use anyhow::{Result, bail};

use rosa_roles::clients::IamClients;
use rosa_roles::error::IamError;
use rosa_roles::iam::{AttachedPolicy, CreatePolicyInput, CreateRoleInput, IamRole};
use rosa_roles::roles;
use rosa_roles::tags::Tags;

pub const ACCOUNT_ID: &str = "123456789012";

#[derive(Clone, Debug, Default)]
pub struct MockRole {
  pub role: IamRole,
  pub trust_policy: String,
  pub tags: Tags,
  pub attached: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MockPolicy {
  pub name: String,
  pub tags: Tags,
  /// Documents in creation order; the last one is the default version
  pub versions: Vec<String>,
}

/// In-memory IAM account. Every mutation is appended to `calls` so tests can assert on
/// what would have been sent to AWS.
#[derive(Debug, Default)]
pub struct MockState {
  pub roles: BTreeMap<String, MockRole>,
  pub policies: BTreeMap<String, MockPolicy>,
  pub calls: Vec<String>,
  /// Roles whose tags cannot be read
  pub denied: BTreeSet<String>,
}

#[derive(Clone, Default)]
pub struct MockIamClients {
  pub state: Arc<Mutex<MockState>>,
}

fn not_found(resource: &str) -> anyhow::Error {
  anyhow::Error::new(IamError::NotFound {
    resource: resource.to_string(),
    message: "The role cannot be found".to_string(),
  })
}

fn already_exists(resource: &str) -> anyhow::Error {
  anyhow::Error::new(IamError::AlreadyExists {
    resource: resource.to_string(),
    message: "Entity already exists".to_string(),
  })
}

impl MockIamClients {
  pub fn role(&self, name: &str) -> Option<MockRole> {
    self.state.lock().unwrap().roles.get(name).cloned()
  }

  pub fn policy(&self, arn: &str) -> Option<MockPolicy> {
    self.state.lock().unwrap().policies.get(arn).cloned()
  }

  pub fn calls(&self) -> Vec<String> {
    self.state.lock().unwrap().calls.clone()
  }

  /// Mutating calls only (reads are not recorded)
  pub fn count_calls(&self, prefix: &str) -> usize {
    self.calls().iter().filter(|c| c.starts_with(prefix)).count()
  }

  pub fn insert_role(&self, name: &str, tags: Tags, permissions_boundary: Option<&str>) {
    let role = MockRole {
      role: IamRole {
        name: name.to_string(),
        arn: roles::role_arn("aws", ACCOUNT_ID, "/", name),
        path: "/".to_string(),
        permissions_boundary: permissions_boundary.map(str::to_string),
      },
      trust_policy: "{}".to_string(),
      tags,
      attached: Vec::new(),
    };
    self.state.lock().unwrap().roles.insert(name.to_string(), role);
  }

  pub fn insert_policy(&self, arn: &str, name: &str, tags: Tags) {
    let policy = MockPolicy {
      name: name.to_string(),
      tags,
      versions: vec!["{}".to_string()],
    };
    self.state.lock().unwrap().policies.insert(arn.to_string(), policy);
  }

  pub fn deny(&self, role_name: &str) {
    self.state.lock().unwrap().denied.insert(role_name.to_string());
  }
}

impl IamClients for MockIamClients {
  async fn get_caller_account_id(&self) -> Result<String> {
    Ok(ACCOUNT_ID.to_string())
  }

  async fn get_role(&self, name: &str) -> Result<Option<IamRole>> {
    Ok(self.state.lock().unwrap().roles.get(name).map(|r| r.role.clone()))
  }

  async fn list_roles(&self) -> Result<Vec<IamRole>> {
    Ok(self.state.lock().unwrap().roles.values().map(|r| r.role.clone()).collect())
  }

  async fn list_role_tags(&self, name: &str) -> Result<Tags> {
    let state = self.state.lock().unwrap();
    if state.denied.contains(name) {
      return Err(anyhow::Error::new(IamError::AccessDenied {
        resource: name.to_string(),
        message: "not authorized to perform iam:ListRoleTags".to_string(),
      }));
    }
    state.roles.get(name).map(|r| r.tags.clone()).ok_or_else(|| not_found(name))
  }

  async fn create_role(&self, input: &CreateRoleInput) -> Result<String> {
    let mut state = self.state.lock().unwrap();
    if state.roles.contains_key(&input.name) {
      return Err(already_exists(&input.name));
    }

    let arn = roles::role_arn("aws", ACCOUNT_ID, &input.path, &input.name);
    state.calls.push(format!("create-role {}", input.name));
    state.roles.insert(
      input.name.clone(),
      MockRole {
        role: IamRole {
          name: input.name.clone(),
          arn: arn.clone(),
          path: input.path.clone(),
          permissions_boundary: input.permissions_boundary.clone(),
        },
        trust_policy: input.assume_role_policy.clone(),
        tags: input.tags.clone(),
        attached: Vec::new(),
      },
    );

    Ok(arn)
  }

  async fn update_assume_role_policy(&self, name: &str, document: &str) -> Result<()> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("update-assume-role-policy {name}"));
    let role = state.roles.get_mut(name).ok_or_else(|| not_found(name))?;
    role.trust_policy = document.to_string();
    Ok(())
  }

  async fn put_role_permissions_boundary(&self, name: &str, boundary: &str) -> Result<()> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("put-role-permissions-boundary {name}"));
    let role = state.roles.get_mut(name).ok_or_else(|| not_found(name))?;
    role.role.permissions_boundary = Some(boundary.to_string());
    Ok(())
  }

  async fn delete_role_permissions_boundary(&self, name: &str) -> Result<()> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("delete-role-permissions-boundary {name}"));
    let role = state.roles.get_mut(name).ok_or_else(|| not_found(name))?;
    role.role.permissions_boundary = None;
    Ok(())
  }

  async fn tag_role(&self, name: &str, tags: &Tags) -> Result<()> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("tag-role {name}"));
    let role = state.roles.get_mut(name).ok_or_else(|| not_found(name))?;
    role.tags.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(())
  }

  async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("attach-role-policy {role_name} {policy_arn}"));
    let role = state.roles.get_mut(role_name).ok_or_else(|| not_found(role_name))?;
    if !role.attached.iter().any(|a| a == policy_arn) {
      role.attached.push(policy_arn.to_string());
    }
    Ok(())
  }

  async fn list_attached_role_policies(&self, role_name: &str) -> Result<Vec<AttachedPolicy>> {
    let state = self.state.lock().unwrap();
    let role = state.roles.get(role_name).ok_or_else(|| not_found(role_name))?;
    Ok(
      role
        .attached
        .iter()
        .map(|arn| AttachedPolicy {
          name: arn.rsplit('/').next().unwrap_or_default().to_string(),
          arn: arn.clone(),
        })
        .collect(),
    )
  }

  async fn list_policy_tags(&self, policy_arn: &str) -> Result<Tags> {
    let state = self.state.lock().unwrap();
    state
      .policies
      .get(policy_arn)
      .map(|p| p.tags.clone())
      .ok_or_else(|| not_found(policy_arn))
  }

  async fn create_policy(&self, input: &CreatePolicyInput) -> Result<String> {
    let mut state = self.state.lock().unwrap();
    let arn = roles::policy_arn("aws", ACCOUNT_ID, &input.path, &input.name);
    if state.policies.contains_key(&arn) {
      return Err(already_exists(&input.name));
    }

    state.calls.push(format!("create-policy {}", input.name));
    state.policies.insert(
      arn.clone(),
      MockPolicy {
        name: input.name.clone(),
        tags: input.tags.clone(),
        versions: vec![input.document.clone()],
      },
    );

    Ok(arn)
  }

  async fn create_policy_version(&self, policy_arn: &str, document: &str) -> Result<()> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("create-policy-version {policy_arn}"));
    let policy = state.policies.get_mut(policy_arn).ok_or_else(|| not_found(policy_arn))?;
    if policy.versions.len() >= 5 {
      policy.versions.remove(0);
    }
    policy.versions.push(document.to_string());
    Ok(())
  }

  async fn tag_policy(&self, policy_arn: &str, tags: &Tags) -> Result<()> {
    let mut state = self.state.lock().unwrap();
    state.calls.push(format!("tag-policy {policy_arn}"));
    let policy = state.policies.get_mut(policy_arn).ok_or_else(|| not_found(policy_arn))?;
    policy.tags.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(())
  }
}

/// Mock that returns errors for all methods, used for error path testing
pub struct MockIamClientsError;

impl IamClients for MockIamClientsError {
  async fn get_caller_account_id(&self) -> Result<String> { bail!("mock AWS error") }
  async fn get_role(&self, _name: &str) -> Result<Option<IamRole>> { bail!("mock AWS error") }
  async fn list_roles(&self) -> Result<Vec<IamRole>> { bail!("mock AWS error") }
  async fn list_role_tags(&self, _name: &str) -> Result<Tags> { bail!("mock AWS error") }
  async fn create_role(&self, _input: &CreateRoleInput) -> Result<String> { bail!("mock AWS error") }
  async fn update_assume_role_policy(&self, _: &str, _: &str) -> Result<()> { bail!("mock AWS error") }
  async fn put_role_permissions_boundary(&self, _: &str, _: &str) -> Result<()> { bail!("mock AWS error") }
  async fn delete_role_permissions_boundary(&self, _: &str) -> Result<()> { bail!("mock AWS error") }
  async fn tag_role(&self, _: &str, _: &Tags) -> Result<()> { bail!("mock AWS error") }
  async fn attach_role_policy(&self, _: &str, _: &str) -> Result<()> { bail!("mock AWS error") }
  async fn list_attached_role_policies(&self, _: &str) -> Result<Vec<AttachedPolicy>> { bail!("mock AWS error") }
  async fn list_policy_tags(&self, _: &str) -> Result<Tags> { bail!("mock AWS error") }
  async fn create_policy(&self, _input: &CreatePolicyInput) -> Result<String> { bail!("mock AWS error") }
  async fn create_policy_version(&self, _: &str, _: &str) -> Result<()> { bail!("mock AWS error") }
  async fn tag_policy(&self, _: &str, _: &Tags) -> Result<()> { bail!("mock AWS error") }
}
