pub mod cli;
pub mod clients;
pub mod commandbuilder;
pub mod compat;
pub mod config;
pub mod creator;
pub mod error;
pub mod iam;
pub mod output;
pub mod policies;
pub mod roles;
pub mod tags;
pub mod upgrade;
pub mod verify;
pub mod version;

use std::{env, path::PathBuf};

use anyhow::{Context, Result, bail};
use aws_config::meta::region::RegionProviderChain;
use aws_types::region::Region;
pub use cli::{Cli, Commands};
use tracing::info;

use crate::{
  cli::{CreateAccountRoles, ListAccountRoles, Mode, UpgradeAccountRoles, VerifyAccountRoles},
  clients::{IamClients, RealIamClients},
  compat::Topology,
  config::Config,
  creator::{AccountRolesInput, CreatorSelection},
  policies::PolicyTemplates,
};

/// How a command finished, mapped onto the process exit code
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
  Success,
  /// `verify` found roles that are not compatible with the requested version
  Incompatible,
  /// At least one role could not be processed
  Failed,
}

impl Outcome {
  pub fn exit_code(&self) -> i32 {
    match self {
      Outcome::Success => 0,
      Outcome::Incompatible => 1,
      Outcome::Failed => 2,
    }
  }
}

/// Get the configuration to authn/authz with AWS that will be used across AWS clients
pub async fn get_config(region: &Option<String>) -> Result<aws_config::SdkConfig> {
  let aws_region = match region {
    Some(region) => Some(Region::new(region.to_owned())),
    None => env::var("AWS_REGION").ok().map(Region::new),
  };

  let region_provider = RegionProviderChain::first_try(aws_region).or_default_provider();

  Ok(aws_config::from_env().region(region_provider).load().await)
}

/// GovCloud regions live in their own partition
pub fn partition_for(region: Option<&str>, configured: &str) -> String {
  match region {
    Some(region) if region.starts_with("us-gov-") => creator::GOVCLOUD_PARTITION.to_string(),
    _ => configured.to_string(),
  }
}

/// Policy version to create or upgrade to, reduced to its release train (`4.14.3` -> `4.14`)
pub fn resolve_policy_version(flag: Option<&str>, config: &Config) -> Result<String> {
  let version = match flag.or(config.default_version.as_deref()) {
    Some(version) => version,
    None => bail!("A policy version is required; pass --version or set 'default_version' in the config file"),
  };

  Ok(version::major_minor(version)?)
}

fn resolve_prefix(flag: Option<&str>, config: &Config) -> Result<String> {
  let prefix = flag.unwrap_or(&config.prefix).to_string();
  roles::validate_prefix(&prefix)?;
  Ok(prefix)
}

fn policy_templates(flag: Option<PathBuf>, config: &Config) -> PolicyTemplates {
  PolicyTemplates::new(flag.or_else(|| config.policy_dir.clone()), config.managed_policy_arns.clone())
}

/// Options for `create account-roles` after merging flags over the config file
#[derive(Clone, Debug)]
pub struct CreateOptions {
  pub input: AccountRolesInput,
  pub selection: CreatorSelection,
  pub mode: Mode,
  pub output_dir: PathBuf,
}

impl CreateOptions {
  pub fn resolve(args: &CreateAccountRoles, config: &Config, region: Option<&str>, account_id: String) -> Result<Self> {
    let partition = partition_for(region, &config.partition);
    let path = args.path.clone().unwrap_or_else(|| config.path.clone());
    roles::validate_path(&path)?;

    Ok(CreateOptions {
      input: AccountRolesInput {
        prefix: resolve_prefix(args.prefix.as_deref(), config)?,
        permissions_boundary: args.permissions_boundary.clone().or_else(|| config.permissions_boundary.clone()),
        account_id,
        partition: partition.clone(),
        env: args.env.clone().unwrap_or_else(|| config.env.clone()),
        policy_version: resolve_policy_version(args.version.as_deref(), config)?,
        path,
        force_policy_creation: args.force_policy_creation,
      },
      selection: CreatorSelection {
        govcloud: partition == creator::GOVCLOUD_PARTITION,
        managed: args.managed,
        classic: args.classic,
        hosted_cp: args.hosted_cp,
      },
      mode: args.mode,
      output_dir: args.output_dir.clone(),
    })
  }
}

/// Create the account roles with every selected creator
pub async fn create_account_roles<C: IamClients>(
  client: &C,
  templates: &PolicyTemplates,
  opts: &CreateOptions,
) -> Result<Outcome> {
  let creators = creator::select(opts.selection)?;

  for creator in &creators {
    match opts.mode {
      Mode::Auto => {
        info!("Creating {} account roles with prefix '{}'", creator.topology(), opts.input.prefix);
        let created = creator.create_roles(client, templates, &opts.input).await?;
        for role in created {
          println!("{} role ARN: {}", role.role_type, role.arn);
        }
      }
      Mode::Manual => {
        let trust_vars = opts.input.trust_policy_vars()?;
        let permission_vars = opts.input.permission_policy_vars();
        let (trust_keys, permission_keys): (Vec<String>, Vec<String>) =
          creator.policy_keys().into_iter().partition(|key| key.ends_with("_trust_policy"));

        policies::write_policy_files(templates, &opts.output_dir, &trust_keys, &trust_vars)?;
        policies::write_policy_files(templates, &opts.output_dir, &permission_keys, &permission_vars)?;
        println!("{}\n", creator.build_commands(templates, &opts.input)?);
      }
    }
  }

  Ok(Outcome::Success)
}

pub async fn create(cli: &Cli, args: &CreateAccountRoles) -> Result<Outcome> {
  let config = config::load(cli.config.as_deref())?;
  let aws_config = get_config(&cli.region).await?;
  let client = RealIamClients::new(&aws_config);

  let account_id = client.get_caller_account_id().await?;
  let region = aws_config.region().map(|r| r.to_string());
  let opts = CreateOptions::resolve(args, &config, region.as_deref(), account_id)?;
  let templates = policy_templates(args.policy_dir.clone(), &config);

  create_account_roles(&client, &templates, &opts).await
}

/// Options for `upgrade account-roles` after merging flags over the config file
#[derive(Clone, Debug)]
pub struct UpgradeOptions {
  pub input: AccountRolesInput,
  pub topology: Topology,
  pub mode: Mode,
  pub output_dir: PathBuf,
  pub quiet: bool,
}

/// Inspect and upgrade the account roles for one prefix
pub async fn upgrade_account_roles<C: IamClients>(
  client: &C,
  templates: &PolicyTemplates,
  opts: &UpgradeOptions,
) -> Result<Outcome> {
  let prefix = &opts.input.prefix;
  let role_count = roles::account_roles(opts.topology).len() as u64;
  let progress = upgrade::build_progress_bar(role_count, opts.quiet)?;

  let discovery = upgrade::discover(client, prefix, &opts.input.policy_version, opts.topology, &progress).await;

  if discovery.is_empty() {
    bail!("No account roles found with prefix '{prefix}'");
  }
  for report in discovery.roles.iter().filter(|r| r.error.is_some()) {
    eprintln!(
      "Unable to check role '{}': {}",
      report.role_name,
      report.error.as_deref().unwrap_or_default()
    );
  }
  let mut mismatched = false;
  for report in discovery.roles.iter().filter(|r| r.status == upgrade::RoleStatus::TopologyMismatch) {
    eprintln!(
      "Role '{}' uses managed policies for a different topology and cannot be upgraded",
      report.role_name
    );
    mismatched = true;
  }

  // A topology mismatch is never compatible, so it fails the upgrade like an error
  let mut failed = discovery.has_errors() || mismatched;

  if discovery.needs_upgrade().next().is_none() {
    if discovery.is_up_to_date() {
      println!("Account roles with prefix '{prefix}' are already up-to-date.");
    }
    return Ok(if failed { Outcome::Failed } else { Outcome::Success });
  }

  match opts.mode {
    Mode::Auto => {
      let outcome = upgrade::upgrade_roles(client, templates, &opts.input, &discovery).await;
      for role in &outcome.upgraded {
        println!("Upgraded role '{role}' to version {}", opts.input.policy_version);
      }
      for (role, err) in &outcome.failed {
        eprintln!("Failed to upgrade role '{role}': {err}");
      }
      failed |= !outcome.failed.is_empty();
    }
    Mode::Manual => {
      let plan = upgrade::plan_manual(client, &opts.input, &discovery).await?;
      policies::write_policy_files(
        templates,
        &opts.output_dir,
        &plan.policy_keys,
        &opts.input.permission_policy_vars(),
      )?;
      println!("{}", plan.commands);
    }
  }

  Ok(if failed { Outcome::Failed } else { Outcome::Success })
}

pub async fn upgrade(cli: &Cli, args: &UpgradeAccountRoles) -> Result<Outcome> {
  let config = config::load(cli.config.as_deref())?;
  let aws_config = get_config(&cli.region).await?;
  let client = RealIamClients::new(&aws_config);

  let region = aws_config.region().map(|r| r.to_string());
  let opts = UpgradeOptions {
    input: AccountRolesInput {
      prefix: resolve_prefix(args.prefix.as_deref(), &config)?,
      permissions_boundary: config.permissions_boundary.clone(),
      account_id: client.get_caller_account_id().await?,
      partition: partition_for(region.as_deref(), &config.partition),
      env: config.env.clone(),
      policy_version: resolve_policy_version(args.version.as_deref(), &config)?,
      path: config.path.clone(),
      force_policy_creation: args.force_policy_creation,
    },
    topology: Topology::from_hosted_cp(args.hosted_cp),
    mode: args.mode,
    output_dir: args.output_dir.clone(),
    quiet: args.no_progress || cli.verbose.is_silent(),
  };
  let templates = policy_templates(args.policy_dir.clone(), &config);

  upgrade_account_roles(&client, &templates, &opts).await
}

/// Report on the account roles without changing them
pub async fn verify_account_roles<C: IamClients>(
  client: &C,
  prefix: &str,
  version: &str,
  topology: Topology,
  quiet: bool,
) -> Result<(upgrade::Discovery, Outcome)> {
  version::parse(version).with_context(|| format!("Invalid version '{version}'"))?;

  let role_count = roles::account_roles(topology).len() as u64;
  let progress = upgrade::build_progress_bar(role_count, quiet)?;
  let discovery = upgrade::discover(client, prefix, version, topology, &progress).await;

  let outcome = if discovery.has_errors() {
    Outcome::Failed
  } else if discovery.is_empty() || !discovery.is_up_to_date() {
    Outcome::Incompatible
  } else {
    Outcome::Success
  };

  Ok((discovery, outcome))
}

pub async fn verify(cli: &Cli, args: &VerifyAccountRoles) -> Result<Outcome> {
  let config = config::load(cli.config.as_deref())?;
  let aws_config = get_config(&cli.region).await?;
  let client = RealIamClients::new(&aws_config);

  let prefix = resolve_prefix(args.prefix.as_deref(), &config)?;
  let version = match args.version.as_deref().or(config.default_version.as_deref()) {
    Some(version) => version.to_string(),
    None => bail!("A policy version is required; pass --version or set 'default_version' in the config file"),
  };

  let quiet = args.no_progress || cli.verbose.is_silent();
  let (discovery, outcome) =
    verify_account_roles(&client, &prefix, &version, Topology::from_hosted_cp(args.hosted_cp), quiet).await?;
  output::output(&discovery, &args.format, &args.output)?;

  Ok(outcome)
}

pub async fn list(cli: &Cli, args: &ListAccountRoles) -> Result<Outcome> {
  let aws_config = get_config(&cli.region).await?;
  let client = RealIamClients::new(&aws_config);

  if let Some(version) = &args.version {
    version::parse(version).with_context(|| format!("Invalid version '{version}'"))?;
  }

  let listed = verify::list_account_roles(&client, args.prefix.as_deref(), args.version.as_deref()).await?;
  output::output(&listed, &args.format, &args.output)?;

  Ok(if listed.has_errors() { Outcome::Failed } else { Outcome::Success })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exit_codes() {
    assert_eq!(Outcome::Success.exit_code(), 0);
    assert_eq!(Outcome::Incompatible.exit_code(), 1);
    assert_eq!(Outcome::Failed.exit_code(), 2);
  }

  #[test]
  fn govcloud_regions_use_their_partition() {
    assert_eq!(partition_for(Some("us-gov-west-1"), "aws"), "aws-us-gov");
    assert_eq!(partition_for(Some("us-east-1"), "aws"), "aws");
    assert_eq!(partition_for(None, "aws-cn"), "aws-cn");
  }

  #[test]
  fn policy_version_prefers_flag() {
    let config = Config {
      default_version: Some("4.13".to_string()),
      ..Default::default()
    };
    assert_eq!(resolve_policy_version(Some("4.15.2"), &config).unwrap(), "4.15");
    assert_eq!(resolve_policy_version(None, &config).unwrap(), "4.13");
    assert!(resolve_policy_version(None, &Config::default()).is_err());
    assert!(resolve_policy_version(Some("latest"), &config).is_err());
  }

  #[test]
  fn prefix_falls_back_to_config() {
    let config = Config::default();
    assert_eq!(resolve_prefix(None, &config).unwrap(), "ManagedOpenShift");
    assert_eq!(resolve_prefix(Some("Team"), &config).unwrap(), "Team");
    assert!(resolve_prefix(Some("bad prefix"), &config).is_err());
  }
}
