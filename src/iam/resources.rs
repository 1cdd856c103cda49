use anyhow::{Context, Result};
use aws_sdk_iam::{
  Client as IamClient,
  error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
  types::{Role, Tag},
};
use aws_sdk_sts::Client as StsClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::IamError, tags::Tags};

/// IAM allows at most five versions of a managed policy
const MAX_POLICY_VERSIONS: usize = 5;

/// The subset of an IAM role used when ensuring and upgrading account roles
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamRole {
  pub name: String,
  pub arn: String,
  pub path: String,
  pub permissions_boundary: Option<String>,
}

impl From<&Role> for IamRole {
  fn from(role: &Role) -> Self {
    IamRole {
      name: role.role_name().to_string(),
      arn: role.arn().to_string(),
      path: role.path().to_string(),
      permissions_boundary: role
        .permissions_boundary()
        .and_then(|b| b.permissions_boundary_arn())
        .map(str::to_string),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedPolicy {
  pub name: String,
  pub arn: String,
}

#[derive(Clone, Debug, Default)]
pub struct CreateRoleInput {
  pub name: String,
  pub assume_role_policy: String,
  pub permissions_boundary: Option<String>,
  pub path: String,
  pub tags: Tags,
}

#[derive(Clone, Debug, Default)]
pub struct CreatePolicyInput {
  pub name: String,
  pub document: String,
  pub path: String,
  pub tags: Tags,
}

/// Convert an SDK failure into the matching [`IamError`] kind
fn classify<E, R>(err: SdkError<E, R>, resource: &str) -> anyhow::Error
where
  E: ProvideErrorMetadata + std::error::Error + 'static,
  R: std::fmt::Debug,
{
  let code = err.code().map(str::to_string);
  let message = match err.message() {
    Some(message) => message.to_string(),
    None => DisplayErrorContext(&err).to_string(),
  };

  anyhow::Error::new(IamError::from_code(code.as_deref(), resource, message))
}

fn to_sdk_tags(tags: &Tags) -> Result<Vec<Tag>> {
  tags
    .iter()
    .map(|(key, value)| Tag::builder().key(key).value(value).build().context("Invalid tag"))
    .collect()
}

fn from_sdk_tags(tags: &[Tag]) -> Tags {
  tags
    .iter()
    .map(|tag| (tag.key().to_string(), tag.value().to_string()))
    .collect()
}

/// Account ID of the credentials in use
pub async fn get_caller_account_id(client: &StsClient) -> Result<String> {
  let identity = client
    .get_caller_identity()
    .send()
    .await
    .map_err(|e| classify(e, "caller identity"))?;

  identity
    .account()
    .map(str::to_string)
    .context("STS GetCallerIdentity response is missing the account ID")
}

/// Describe the role, returning `None` when it does not exist
pub async fn get_role(client: &IamClient, name: &str) -> Result<Option<IamRole>> {
  let response = client.get_role().role_name(name).send().await;

  match response {
    Ok(output) => Ok(output.role().map(IamRole::from)),
    Err(err) => {
      let err = classify(err, name);
      if crate::error::is_not_found(&err) {
        debug!("Role '{name}' does not exist");
        Ok(None)
      } else {
        Err(err)
      }
    }
  }
}

pub async fn list_roles(client: &IamClient) -> Result<Vec<IamRole>> {
  let mut roles = Vec::new();
  let mut marker: Option<String> = None;

  loop {
    let output = client
      .list_roles()
      .set_marker(marker.take())
      .send()
      .await
      .map_err(|e| classify(e, "roles"))?;

    roles.extend(output.roles().iter().map(IamRole::from));

    match (output.is_truncated(), output.marker()) {
      (true, Some(next)) => marker = Some(next.to_string()),
      _ => break,
    }
  }

  Ok(roles)
}

pub async fn list_role_tags(client: &IamClient, name: &str) -> Result<Tags> {
  let output = client
    .list_role_tags()
    .role_name(name)
    .send()
    .await
    .map_err(|e| classify(e, name))?;

  Ok(from_sdk_tags(output.tags()))
}

pub async fn create_role(client: &IamClient, input: &CreateRoleInput) -> Result<String> {
  let output = client
    .create_role()
    .role_name(&input.name)
    .assume_role_policy_document(&input.assume_role_policy)
    .set_permissions_boundary(input.permissions_boundary.clone())
    .path(&input.path)
    .set_tags(Some(to_sdk_tags(&input.tags)?))
    .send()
    .await
    .map_err(|e| classify(e, &input.name))?;

  output
    .role()
    .map(|role| role.arn().to_string())
    .with_context(|| format!("CreateRole response for '{}' is missing the role", input.name))
}

pub async fn update_assume_role_policy(client: &IamClient, name: &str, document: &str) -> Result<()> {
  client
    .update_assume_role_policy()
    .role_name(name)
    .policy_document(document)
    .send()
    .await
    .map_err(|e| classify(e, name))?;

  Ok(())
}

pub async fn put_role_permissions_boundary(client: &IamClient, name: &str, boundary: &str) -> Result<()> {
  client
    .put_role_permissions_boundary()
    .role_name(name)
    .permissions_boundary(boundary)
    .send()
    .await
    .map_err(|e| classify(e, name))?;

  Ok(())
}

pub async fn delete_role_permissions_boundary(client: &IamClient, name: &str) -> Result<()> {
  client
    .delete_role_permissions_boundary()
    .role_name(name)
    .send()
    .await
    .map_err(|e| classify(e, name))?;

  Ok(())
}

pub async fn tag_role(client: &IamClient, name: &str, tags: &Tags) -> Result<()> {
  client
    .tag_role()
    .role_name(name)
    .set_tags(Some(to_sdk_tags(tags)?))
    .send()
    .await
    .map_err(|e| classify(e, name))?;

  Ok(())
}

pub async fn attach_role_policy(client: &IamClient, role_name: &str, policy_arn: &str) -> Result<()> {
  client
    .attach_role_policy()
    .role_name(role_name)
    .policy_arn(policy_arn)
    .send()
    .await
    .map_err(|e| classify(e, role_name))?;

  Ok(())
}

pub async fn list_attached_role_policies(client: &IamClient, role_name: &str) -> Result<Vec<AttachedPolicy>> {
  let output = client
    .list_attached_role_policies()
    .role_name(role_name)
    // An IAM role can have at most 20 managed policies attached
    .max_items(100)
    .send()
    .await
    .map_err(|e| classify(e, role_name))?;

  Ok(
    output
      .attached_policies()
      .iter()
      .map(|policy| AttachedPolicy {
        name: policy.policy_name().unwrap_or_default().to_string(),
        arn: policy.policy_arn().unwrap_or_default().to_string(),
      })
      .collect(),
  )
}

pub async fn list_policy_tags(client: &IamClient, policy_arn: &str) -> Result<Tags> {
  let output = client
    .list_policy_tags()
    .policy_arn(policy_arn)
    .send()
    .await
    .map_err(|e| classify(e, policy_arn))?;

  Ok(from_sdk_tags(output.tags()))
}

pub async fn create_policy(client: &IamClient, input: &CreatePolicyInput) -> Result<String> {
  let output = client
    .create_policy()
    .policy_name(&input.name)
    .policy_document(&input.document)
    .path(&input.path)
    .set_tags(Some(to_sdk_tags(&input.tags)?))
    .send()
    .await
    .map_err(|e| classify(e, &input.name))?;

  output
    .policy()
    .and_then(|policy| policy.arn())
    .map(str::to_string)
    .with_context(|| format!("CreatePolicy response for '{}' is missing the policy ARN", input.name))
}

/// Publish `document` as the new default version of the policy
///
/// The oldest non-default version is removed first when the policy is at the version limit
pub async fn create_policy_version(client: &IamClient, policy_arn: &str, document: &str) -> Result<()> {
  let versions = client
    .list_policy_versions()
    .policy_arn(policy_arn)
    .send()
    .await
    .map_err(|e| classify(e, policy_arn))?;

  let versions = versions.versions();
  if versions.len() >= MAX_POLICY_VERSIONS {
    let oldest = versions
      .iter()
      .filter(|v| !v.is_default_version())
      .min_by_key(|v| v.create_date().map(|d| d.secs()).unwrap_or_default())
      .and_then(|v| v.version_id());

    if let Some(version_id) = oldest {
      debug!("Deleting version '{version_id}' of policy '{policy_arn}'");
      client
        .delete_policy_version()
        .policy_arn(policy_arn)
        .version_id(version_id)
        .send()
        .await
        .map_err(|e| classify(e, policy_arn))?;
    }
  }

  client
    .create_policy_version()
    .policy_arn(policy_arn)
    .policy_document(document)
    .set_as_default(true)
    .send()
    .await
    .map_err(|e| classify(e, policy_arn))?;

  Ok(())
}

pub async fn tag_policy(client: &IamClient, policy_arn: &str, tags: &Tags) -> Result<()> {
  client
    .tag_policy()
    .policy_arn(policy_arn)
    .set_tags(Some(to_sdk_tags(tags)?))
    .send()
    .await
    .map_err(|e| classify(e, policy_arn))?;

  Ok(())
}
