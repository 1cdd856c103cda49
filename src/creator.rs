//! Creates the account roles and their permission policies
//!
//! Three flavours exist: classic roles backed by customer managed policies, classic roles
//! backed by AWS managed policies, and hosted control plane roles (always AWS managed)

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
  clients::IamClients,
  commandbuilder::{self, Command, CommandBuilder, Param},
  compat::{self, Topology},
  error,
  iam::{CreatePolicyInput, CreateRoleInput},
  policies::{PolicyTemplates, PolicyVars},
  roles::{self, AccountRoleType},
  tags::{self, Tags},
};

pub const GOVCLOUD_PARTITION: &str = "aws-us-gov";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Creator {
  UnmanagedPolicies,
  ManagedPolicies,
  HostedCpManagedPolicies,
}

/// Flags that decide which creators run
#[derive(Clone, Copy, Debug, Default)]
pub struct CreatorSelection {
  pub govcloud: bool,
  pub managed: bool,
  pub classic: bool,
  pub hosted_cp: bool,
}

/// Pick the creators for a `create account-roles` invocation
///
/// Without `--classic` or `--hosted-cp` both sets are created, except in GovCloud
/// where hosted control planes are unavailable
pub fn select(selection: CreatorSelection) -> Result<Vec<Creator>> {
  let CreatorSelection {
    govcloud,
    managed,
    classic,
    hosted_cp,
  } = selection;

  if govcloud && managed {
    bail!("Managed policies are not supported in the {GOVCLOUD_PARTITION} partition");
  }
  if govcloud && hosted_cp {
    bail!("Hosted control planes are not supported in the {GOVCLOUD_PARTITION} partition");
  }

  let classic_creator = if managed {
    Creator::ManagedPolicies
  } else {
    Creator::UnmanagedPolicies
  };

  let creators = match (classic, hosted_cp) {
    (true, false) => vec![classic_creator],
    (false, true) => vec![Creator::HostedCpManagedPolicies],
    _ if govcloud => vec![classic_creator],
    _ => vec![classic_creator, Creator::HostedCpManagedPolicies],
  };

  Ok(creators)
}

/// Values shared by every role one creator produces
#[derive(Clone, Debug)]
pub struct AccountRolesInput {
  pub prefix: String,
  pub permissions_boundary: Option<String>,
  pub account_id: String,
  pub partition: String,
  pub env: String,
  pub policy_version: String,
  pub path: String,
  pub force_policy_creation: bool,
}

impl AccountRolesInput {
  /// Variables for trust policies; the trusted account is the environment's jump account
  pub fn trust_policy_vars(&self) -> Result<PolicyVars> {
    let jump_account = match roles::jump_account(&self.env) {
      Some(account) => account,
      None => bail!("Unknown environment '{}'", self.env),
    };

    Ok(PolicyVars {
      partition: self.partition.clone(),
      aws_account_id: jump_account.to_string(),
    })
  }

  /// Variables for permission policies, scoped to the account the roles live in
  pub fn permission_policy_vars(&self) -> PolicyVars {
    PolicyVars {
      partition: self.partition.clone(),
      aws_account_id: self.account_id.clone(),
    }
  }
}

/// How a role receives its permissions
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Attachment {
  /// A policy owned by the customer account, rendered from `document_key`
  Customer {
    name: String,
    arn: String,
    document_key: String,
  },
  /// An AWS managed policy
  Managed { arn: String },
}

impl Attachment {
  pub fn arn(&self) -> &str {
    match self {
      Attachment::Customer { arn, .. } => arn,
      Attachment::Managed { arn } => arn,
    }
  }
}

/// A role that exists after `create_roles` completes
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreatedRole {
  pub name: String,
  pub arn: String,
  pub role_type: AccountRoleType,
}

impl Creator {
  pub fn topology(&self) -> Topology {
    match self {
      Creator::UnmanagedPolicies | Creator::ManagedPolicies => Topology::Classic,
      Creator::HostedCpManagedPolicies => Topology::HostedControlPlane,
    }
  }

  pub fn is_managed(&self) -> bool {
    !matches!(self, Creator::UnmanagedPolicies)
  }

  pub fn roles(&self) -> &'static [AccountRoleType] {
    roles::account_roles(self.topology())
  }

  pub fn role_name(&self, prefix: &str, role: AccountRoleType) -> String {
    roles::role_name(prefix, role, self.topology())
  }

  pub fn role_tags(&self, role: AccountRoleType, input: &AccountRolesInput) -> Tags {
    let mut role_tags = base_role_tags(role, input);

    if self.is_managed() {
      role_tags.insert(tags::MANAGED_POLICIES.to_string(), tags::TRUE.to_string());
    }
    if self.topology().is_hosted_cp() {
      role_tags.insert(tags::HCP_POLICIES.to_string(), tags::TRUE.to_string());
    }

    role_tags
  }

  pub fn attachment(
    &self,
    role: AccountRoleType,
    input: &AccountRolesInput,
    templates: &PolicyTemplates,
  ) -> Result<Attachment> {
    let key = role.permission_policy_key(self.topology());

    match self {
      Creator::UnmanagedPolicies => {
        let name = roles::policy_name(&self.role_name(&input.prefix, role));
        let arn = roles::policy_arn(&input.partition, &input.account_id, &input.path, &name);
        Ok(Attachment::Customer {
          name,
          arn,
          document_key: key,
        })
      }
      Creator::ManagedPolicies | Creator::HostedCpManagedPolicies => Ok(Attachment::Managed {
        arn: templates.managed_policy_arn(&key, &input.partition)?,
      }),
    }
  }

  /// Policy documents referenced by the commands from [`Creator::build_commands`]
  pub fn policy_keys(&self) -> Vec<String> {
    let topology = self.topology();
    let mut keys = Vec::new();

    for role in self.roles() {
      keys.push(role.trust_policy_key(topology));
      if !self.is_managed() {
        keys.push(role.permission_policy_key(topology));
      }
    }

    keys
  }

  /// Ensure every role of this creator exists with its permissions attached
  pub async fn create_roles<C: IamClients>(
    &self,
    client: &C,
    templates: &PolicyTemplates,
    input: &AccountRolesInput,
  ) -> Result<Vec<CreatedRole>> {
    let topology = self.topology();
    let trust_vars = input.trust_policy_vars()?;
    let mut created = Vec::with_capacity(self.roles().len());

    for role in self.roles() {
      let name = self.role_name(&input.prefix, *role);
      let role_tags = self.role_tags(*role, input);

      debug!("Creating role '{name}'");
      let arn = ensure_role(
        client,
        &RoleSpec {
          name: name.clone(),
          trust_policy: templates.render(&role.trust_policy_key(topology), &trust_vars)?,
          permissions_boundary: input.permissions_boundary.clone(),
          version: input.policy_version.clone(),
          tags: role_tags.clone(),
          path: input.path.clone(),
          role_type: *role,
          topology,
        },
      )
      .await?;
      info!("Created role '{name}' with ARN '{arn}'");

      let policy_arn = match self.attachment(*role, input, templates)? {
        Attachment::Customer {
          name: policy_name,
          arn,
          document_key,
        } => {
          debug!("Creating permission policy '{arn}'");
          ensure_policy(
            client,
            &PolicySpec {
              arn,
              name: policy_name,
              document: templates.render(&document_key, &input.permission_policy_vars())?,
              version: input.policy_version.clone(),
              tags: role_tags,
              path: input.path.clone(),
              force: input.force_policy_creation,
            },
          )
          .await?
        }
        Attachment::Managed { arn } => arn,
      };

      debug!("Attaching permission policy '{policy_arn}' to role '{name}'");
      client.attach_role_policy(&name, &policy_arn).await?;

      created.push(CreatedRole {
        name,
        arn,
        role_type: *role,
      });
    }

    Ok(created)
  }

  /// `aws` commands equivalent to [`Creator::create_roles`]
  pub fn build_commands(&self, templates: &PolicyTemplates, input: &AccountRolesInput) -> Result<String> {
    let topology = self.topology();
    let mut commands = Vec::new();

    for role in self.roles() {
      let name = self.role_name(&input.prefix, *role);
      let role_tags = self.role_tags(*role, input);

      commands.push(
        CommandBuilder::iam()
          .command(Command::CreateRole)
          .param(Param::RoleName, &name)
          .param(
            Param::AssumeRolePolicyDocument,
            format!("file://{}.json", role.trust_policy_key(topology)),
          )
          .param(Param::PermissionsBoundary, input.permissions_boundary.as_deref().unwrap_or_default())
          .tags(&role_tags)
          .param(Param::Path, &input.path)
          .build(),
      );

      let attachment = self.attachment(*role, input, templates)?;
      if let Attachment::Customer {
        name: policy_name,
        document_key,
        ..
      } = &attachment
      {
        commands.push(
          CommandBuilder::iam()
            .command(Command::CreatePolicy)
            .param(Param::PolicyName, policy_name)
            .param(Param::PolicyDocument, format!("file://{document_key}.json"))
            .tags(&role_tags)
            .param(Param::Path, &input.path)
            .build(),
        );
      }

      commands.push(attach_role_policy_command(&name, attachment.arn()));
    }

    Ok(commandbuilder::join_commands(&commands))
  }
}

fn base_role_tags(role: AccountRoleType, input: &AccountRolesInput) -> Tags {
  Tags::from([
    (tags::OPENSHIFT_VERSION.to_string(), input.policy_version.clone()),
    (tags::ROLE_PREFIX.to_string(), input.prefix.clone()),
    (tags::ROLE_TYPE.to_string(), role.tag_value().to_string()),
    (tags::RED_HAT_MANAGED.to_string(), tags::TRUE.to_string()),
  ])
}

pub fn attach_role_policy_command(role_name: &str, policy_arn: &str) -> String {
  CommandBuilder::iam()
    .command(Command::AttachRolePolicy)
    .param(Param::RoleName, role_name)
    .param(Param::PolicyArn, policy_arn)
    .build()
}

/// Desired state of an account role
#[derive(Clone, Debug)]
pub struct RoleSpec {
  pub name: String,
  pub trust_policy: String,
  pub permissions_boundary: Option<String>,
  pub version: String,
  pub tags: Tags,
  pub path: String,
  pub role_type: AccountRoleType,
  pub topology: Topology,
}

/// Create the role, or bring an existing one up to `spec.version`
///
/// Returns the role ARN
pub async fn ensure_role<C: IamClients>(client: &C, spec: &RoleSpec) -> Result<String> {
  let role = match client.get_role(&spec.name).await? {
    Some(role) => role,
    None => return create_role(client, spec).await,
  };

  match (&spec.permissions_boundary, &role.permissions_boundary) {
    (Some(boundary), _) => client.put_role_permissions_boundary(&spec.name, boundary).await?,
    (None, Some(_)) => {
      debug!("Removing permissions boundary from role '{}'", spec.name);
      client.delete_role_permissions_boundary(&spec.name).await?
    }
    (None, None) => {}
  }

  let current_tags = client.list_role_tags(&spec.name).await?;
  let compatible = compat::is_compatible(&current_tags, spec.role_type.tag_value(), &spec.version, spec.topology)?;

  if !compatible {
    info!("Updating role '{}' to version {}", spec.name, spec.version);
    client.update_assume_role_policy(&spec.name, &spec.trust_policy).await?;
    client.tag_role(&spec.name, &spec.tags).await?;
  }

  Ok(role.arn)
}

async fn create_role<C: IamClients>(client: &C, spec: &RoleSpec) -> Result<String> {
  roles::validate_role_name(&spec.name)?;

  let input = CreateRoleInput {
    name: spec.name.clone(),
    assume_role_policy: spec.trust_policy.clone(),
    permissions_boundary: spec.permissions_boundary.clone(),
    path: spec.path.clone(),
    tags: spec.tags.clone(),
  };

  match client.create_role(&input).await {
    Ok(arn) => Ok(arn),
    // Created concurrently by someone else
    Err(err) if error::is_already_exists(&err) => client
      .get_role(&spec.name)
      .await?
      .map(|role| role.arn)
      .with_context(|| format!("Role '{}' already exists but could not be described", spec.name)),
    Err(err) => Err(err),
  }
}

/// Desired state of a customer managed permission policy
#[derive(Clone, Debug)]
pub struct PolicySpec {
  pub arn: String,
  pub name: String,
  pub document: String,
  pub version: String,
  pub tags: Tags,
  pub path: String,
  /// Publish a new version even when the tags say the policy is current
  pub force: bool,
}

/// Create the policy, or publish a new default version when it is behind `spec.version`
///
/// Returns the policy ARN
pub async fn ensure_policy<C: IamClients>(client: &C, spec: &PolicySpec) -> Result<String> {
  let current_tags = match client.list_policy_tags(&spec.arn).await {
    Ok(current_tags) => current_tags,
    Err(err) if error::is_not_found(&err) => return create_policy(client, spec).await,
    Err(err) => return Err(err),
  };

  let up_to_date = if spec.force {
    false
  } else {
    compat::is_policy_compatible(&current_tags, &spec.arn, &spec.version)?
  };

  if !up_to_date {
    info!("Creating new version of policy '{}' for {}", spec.arn, spec.version);
    client.create_policy_version(&spec.arn, &spec.document).await?;
    client.tag_policy(&spec.arn, &spec.tags).await?;
  }

  Ok(spec.arn.clone())
}

async fn create_policy<C: IamClients>(client: &C, spec: &PolicySpec) -> Result<String> {
  let input = CreatePolicyInput {
    name: spec.name.clone(),
    document: spec.document.clone(),
    path: spec.path.clone(),
    tags: spec.tags.clone(),
  };

  match client.create_policy(&input).await {
    Ok(arn) => Ok(arn),
    Err(err) if error::is_already_exists(&err) => Ok(spec.arn.clone()),
    Err(err) => Err(err),
  }
}
