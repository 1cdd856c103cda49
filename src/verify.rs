use anyhow::Result;
use serde::{Deserialize, Serialize};
use tabled::{
  Table, Tabled,
  settings::{Remove, Style, location::ByColumnName},
};
use tracing::{debug, warn};

use crate::{
  clients::IamClients,
  compat::{self, Topology},
  error,
  output::{self, Render},
  roles::AccountRoleType,
  tags,
  upgrade::{Discovery, RoleStatus},
};

#[derive(Debug, Tabled)]
#[tabled(rename_all = "UpperCase")]
struct VerifyRow {
  #[tabled(rename = "ROLE NAME")]
  role_name: String,
  #[tabled(rename = "TYPE")]
  role_type: String,
  version: String,
  managed: String,
  #[tabled(rename = "HCP")]
  hosted_cp: String,
  status: String,
}

impl Render for Discovery {
  fn to_stdout_table(&self) -> Result<String> {
    let rows: Vec<VerifyRow> = self
      .roles
      .iter()
      .map(|r| VerifyRow {
        role_name: r.role_name.clone(),
        role_type: r.role_type.to_string(),
        version: r.version.clone().unwrap_or_default(),
        managed: output::tabled_bool(r.managed),
        hosted_cp: output::tabled_bool(r.hosted_cp),
        status: match &r.error {
          Some(err) => format!("{}: {err}", r.status),
          None => r.status.to_string(),
        },
      })
      .collect();

    let mut table = Table::new(rows);
    table.with(Style::sharp());

    Ok(format!(
      "Account roles with prefix '{}' checked against version {} ({})\n{table}\n",
      self.prefix, self.target_version, self.topology
    ))
  }
}

/// An IAM role tagged as one of the account roles
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedRole {
  pub name: String,
  pub arn: String,
  pub role_type: AccountRoleType,
  pub prefix: Option<String>,
  pub version: Option<String>,
  pub managed: bool,
  pub hosted_cp: bool,
  /// Only set when a target version was requested
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<RoleStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

/// A role whose tags could not be read
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadableRole {
  pub name: String,
  pub arn: String,
  pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedRoles {
  pub roles: Vec<ListedRole>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub unreadable: Vec<UnreadableRole>,
}

impl ListedRoles {
  pub fn has_errors(&self) -> bool {
    !self.unreadable.is_empty() || self.roles.iter().any(|r| r.error.is_some())
  }
}

#[derive(Debug, Tabled)]
#[tabled(rename_all = "UpperCase")]
struct ListRow {
  #[tabled(rename = "ROLE NAME")]
  name: String,
  #[tabled(rename = "TYPE")]
  role_type: String,
  #[tabled(rename = "ROLE ARN")]
  arn: String,
  version: String,
  managed: String,
  #[tabled(rename = "HCP")]
  hosted_cp: String,
  status: String,
}

impl Render for ListedRoles {
  fn to_stdout_table(&self) -> Result<String> {
    let mut output = String::new();

    if self.roles.is_empty() {
      output.push_str("No account roles found");
    } else {
      let rows: Vec<ListRow> = self
        .roles
        .iter()
        .map(|r| ListRow {
          name: r.name.clone(),
          role_type: r.role_type.to_string(),
          arn: r.arn.clone(),
          version: r.version.clone().unwrap_or_default(),
          managed: output::tabled_bool(r.managed),
          hosted_cp: output::tabled_bool(r.hosted_cp),
          status: match (&r.status, &r.error) {
            (Some(status), Some(err)) => format!("{status}: {err}"),
            (Some(status), None) => status.to_string(),
            (None, _) => String::new(),
          },
        })
        .collect();

      let mut table = Table::new(rows);
      table.with(Style::sharp());

      // The status column only exists when a version was requested
      if self.roles.iter().all(|r| r.status.is_none()) {
        table.with(Remove::column(ByColumnName::new("STATUS")));
      }

      output.push_str(&format!("{table}\n"));
    }

    for role in &self.unreadable {
      output.push_str(&format!("\nUnable to read tags of role '{}': {}", role.name, role.error));
    }

    Ok(output)
  }
}

/// Every IAM role in the account carrying a known `rosa_role_type` tag
///
/// `prefix` narrows the list to one set of roles; `version` adds a compatibility status,
/// judged against the topology the role's own tags declare. Roles whose tags cannot be
/// read are recorded and the listing continues
pub async fn list_account_roles<C: IamClients>(
  client: &C,
  prefix: Option<&str>,
  version: Option<&str>,
) -> Result<ListedRoles> {
  let mut listed = ListedRoles::default();

  for role in client.list_roles().await? {
    let role_tags = match client.list_role_tags(&role.name).await {
      Ok(role_tags) => role_tags,
      Err(err) if error::is_not_found(&err) => {
        debug!("Role '{}' was deleted while listing", role.name);
        continue;
      }
      Err(err) => {
        if error::is_throttled(&err) {
          warn!("Throttled while reading tags of '{}'", role.name);
        }
        listed.unreadable.push(UnreadableRole {
          name: role.name,
          arn: role.arn,
          error: format!("{err:#}"),
        });
        continue;
      }
    };

    let role_type = match tags::extract_role_type(&role_tags).and_then(AccountRoleType::from_tag_value) {
      Some(role_type) => role_type,
      None => continue,
    };

    let role_prefix = role_tags.get(tags::ROLE_PREFIX).cloned();
    if prefix.is_some() && role_prefix.as_deref() != prefix {
      debug!("Skipping role '{}' with prefix {role_prefix:?}", role.name);
      continue;
    }

    let managed = tags::has_managed_policies(&role_tags);
    let hosted_cp = tags::has_hosted_cp_policies(&role_tags);

    let mut status = None;
    let mut failure = None;
    if let Some(version) = version {
      match compat::evaluate(&role.name, &role_tags, version, Topology::from_hosted_cp(hosted_cp)) {
        Ok(result) if result.compatible => status = Some(RoleStatus::Compatible),
        Ok(_) => status = Some(RoleStatus::Upgrade),
        Err(err) => {
          status = Some(RoleStatus::Error);
          failure = Some(err.to_string());
        }
      }
    }

    listed.roles.push(ListedRole {
      name: role.name,
      arn: role.arn,
      role_type,
      prefix: role_prefix,
      version: tags::extract_version(&role_tags).map(str::to_string),
      managed,
      hosted_cp,
      status,
      error: failure,
    });
  }

  Ok(listed)
}
