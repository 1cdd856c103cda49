use std::path::PathBuf;

use anstyle::{AnsiColor, Color, Style};
use clap::{Args, Parser, Subcommand, ValueEnum, builder::Styles};
use clap_verbosity_flag::Verbosity;
use serde::{Deserialize, Serialize};

use crate::output;

fn styles() -> Styles {
  Styles::styled()
    .header(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
    .usage(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Yellow))))
    .literal(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Green))))
    .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
}

#[derive(Parser, Debug)]
#[command(author, about, version)]
#[command(propagate_version = true, styles = styles())]
pub struct Cli {
  #[command(subcommand)]
  pub commands: Commands,

  /// The AWS region used for API calls
  #[arg(short, long, global = true)]
  pub region: Option<String>,

  /// Path to the config file (defaults to `.rosa-roles.yaml` in the current directory)
  #[arg(short, long, global = true)]
  pub config: Option<String>,

  #[clap(flatten)]
  pub verbose: Verbosity,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  /// Create resources
  #[command(arg_required_else_help = true)]
  Create(Create),
  /// Upgrade resources to a newer policy version
  #[command(arg_required_else_help = true)]
  Upgrade(Upgrade),
  /// Check resources against a policy version without changing them
  #[command(arg_required_else_help = true)]
  Verify(Verify),
  /// List resources
  #[command(arg_required_else_help = true)]
  List(List),
}

/// How changes are applied to the AWS account
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Mode {
  /// Apply the changes directly
  #[default]
  Auto,
  /// Print the equivalent `aws` commands and write the policy documents they use
  Manual,
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct Create {
  #[command(subcommand)]
  pub command: CreateCommands,
}

#[derive(Debug, Subcommand, Serialize, Deserialize)]
pub enum CreateCommands {
  /// Create the account-wide IAM roles used by clusters
  #[command(disable_version_flag = true)]
  AccountRoles(CreateAccountRoles),
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct CreateAccountRoles {
  /// Prefix for the role names
  #[arg(short, long)]
  pub prefix: Option<String>,

  /// IAM path for the roles and policies
  #[arg(long)]
  pub path: Option<String>,

  /// ARN of the policy used as permissions boundary for the roles
  #[arg(long)]
  pub permissions_boundary: Option<String>,

  /// Policy version the roles are created for (e.g. 4.14)
  #[arg(long)]
  pub version: Option<String>,

  #[arg(short, long, value_enum, default_value_t)]
  pub mode: Mode,

  /// Attach AWS managed policies instead of creating customer managed ones
  #[arg(long, alias = "managed-policies")]
  pub managed: bool,

  /// Only create the roles for classic clusters
  #[arg(long, conflicts_with = "hosted_cp")]
  pub classic: bool,

  /// Only create the roles for hosted control plane clusters
  #[arg(long)]
  pub hosted_cp: bool,

  /// Publish new policy versions even when existing policies are current
  #[arg(long)]
  pub force_policy_creation: bool,

  /// Environment whose jump account the trust policies reference
  #[arg(long)]
  pub env: Option<String>,

  /// Directory with policy documents that replace the built-in ones
  #[arg(long)]
  pub policy_dir: Option<PathBuf>,

  /// Directory the policy documents are written to in manual mode
  #[arg(long, default_value = ".")]
  pub output_dir: PathBuf,
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct Upgrade {
  #[command(subcommand)]
  pub command: UpgradeCommands,
}

#[derive(Debug, Subcommand, Serialize, Deserialize)]
pub enum UpgradeCommands {
  /// Upgrade the permission policies of existing account roles
  #[command(disable_version_flag = true)]
  AccountRoles(UpgradeAccountRoles),
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct UpgradeAccountRoles {
  /// Prefix of the roles to upgrade
  #[arg(short, long)]
  pub prefix: Option<String>,

  /// Policy version to upgrade to (e.g. 4.15)
  #[arg(long)]
  pub version: Option<String>,

  #[arg(short, long, value_enum, default_value_t)]
  pub mode: Mode,

  /// Upgrade the hosted control plane roles instead of the classic ones
  #[arg(long)]
  pub hosted_cp: bool,

  /// Publish new policy versions even when existing policies are current
  #[arg(long)]
  pub force_policy_creation: bool,

  /// Directory with policy documents that replace the built-in ones
  #[arg(long)]
  pub policy_dir: Option<PathBuf>,

  /// Directory the policy documents are written to in manual mode
  #[arg(long, default_value = ".")]
  pub output_dir: PathBuf,

  /// Hide the progress spinner
  #[arg(long)]
  pub no_progress: bool,
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct Verify {
  #[command(subcommand)]
  pub command: VerifyCommands,
}

#[derive(Debug, Subcommand, Serialize, Deserialize)]
pub enum VerifyCommands {
  /// Report whether the account roles are compatible with a policy version
  #[command(disable_version_flag = true)]
  AccountRoles(VerifyAccountRoles),
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct VerifyAccountRoles {
  /// Prefix of the roles to verify
  #[arg(short, long)]
  pub prefix: Option<String>,

  /// Policy version to verify against (e.g. 4.14)
  #[arg(long)]
  pub version: Option<String>,

  /// Verify the hosted control plane roles instead of the classic ones
  #[arg(long)]
  pub hosted_cp: bool,

  #[arg(short, long, value_enum, default_value_t)]
  pub format: output::Format,

  /// Write to file instead of stdout
  #[arg(short, long)]
  pub output: Option<String>,

  /// Hide the progress spinner
  #[arg(long)]
  pub no_progress: bool,
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct List {
  #[command(subcommand)]
  pub command: ListCommands,
}

#[derive(Debug, Subcommand, Serialize, Deserialize)]
pub enum ListCommands {
  /// List the account roles in the AWS account
  #[command(disable_version_flag = true)]
  AccountRoles(ListAccountRoles),
}

#[derive(Args, Debug, Serialize, Deserialize)]
pub struct ListAccountRoles {
  /// Only list roles with this prefix
  #[arg(short, long)]
  pub prefix: Option<String>,

  /// Add a column with the compatibility of each role with this policy version
  #[arg(long)]
  pub version: Option<String>,

  #[arg(short, long, value_enum, default_value_t)]
  pub format: output::Format,

  /// Write to file instead of stdout
  #[arg(short, long)]
  pub output: Option<String>,
}
