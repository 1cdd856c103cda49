//! Builds `aws` CLI commands that reproduce what auto mode would do
//!
//! Used in manual mode so users can review and run the IAM changes themselves

use std::fmt;

use crate::tags::Tags;

const PARAM_SEPARATOR: &str = " \\\n";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
  Iam,
}

impl fmt::Display for Service {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Service::Iam => write!(f, "iam"),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
  CreateRole,
  CreatePolicy,
  CreatePolicyVersion,
  AttachRolePolicy,
  TagRole,
  TagPolicy,
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let command = match self {
      Command::CreateRole => "create-role",
      Command::CreatePolicy => "create-policy",
      Command::CreatePolicyVersion => "create-policy-version",
      Command::AttachRolePolicy => "attach-role-policy",
      Command::TagRole => "tag-role",
      Command::TagPolicy => "tag-policy",
    };
    write!(f, "{command}")
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Param {
  Tags,
  RoleName,
  AssumeRolePolicyDocument,
  PermissionsBoundary,
  Path,
  PolicyName,
  PolicyDocument,
  PolicyArn,
  SetAsDefault,
}

impl fmt::Display for Param {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let param = match self {
      Param::Tags => "tags",
      Param::RoleName => "role-name",
      Param::AssumeRolePolicyDocument => "assume-role-policy-document",
      Param::PermissionsBoundary => "permissions-boundary",
      Param::Path => "path",
      Param::PolicyName => "policy-name",
      Param::PolicyDocument => "policy-document",
      Param::PolicyArn => "policy-arn",
      Param::SetAsDefault => "set-as-default",
    };
    write!(f, "{param}")
  }
}

#[derive(Clone, Debug)]
pub struct CommandBuilder {
  service: Service,
  command: Option<Command>,
  params: Vec<String>,
  tags: Tags,
}

impl CommandBuilder {
  pub fn iam() -> Self {
    Self {
      service: Service::Iam,
      command: None,
      params: Vec::new(),
      tags: Tags::new(),
    }
  }

  pub fn command(mut self, command: Command) -> Self {
    self.command = Some(command);
    self
  }

  /// Adds `--<param> <value>`; empty values are dropped
  pub fn param(mut self, param: Param, value: impl AsRef<str>) -> Self {
    let value = value.as_ref();
    if !value.is_empty() {
      self.params.push(format!("\t--{param} {value}"));
    }
    self
  }

  /// Adds a bare `--<param>` switch
  pub fn switch(mut self, param: Param) -> Self {
    self.params.push(format!("\t--{param}"));
    self
  }

  pub fn tags(mut self, tags: &Tags) -> Self {
    self.tags.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    self
  }

  pub fn build(self) -> String {
    let Self {
      service,
      command,
      mut params,
      tags,
    } = self;

    if !tags.is_empty() {
      params.push(format!("\t--{} {}", Param::Tags, render_tags(&tags)));
    }
    params.sort();

    let command = match command {
      Some(command) => format!(" {command}{PARAM_SEPARATOR}"),
      None => String::new(),
    };

    format!("aws {service}{command}{}", params.join(PARAM_SEPARATOR))
  }
}

/// `Key=k,Value=v` pairs ordered by length and then lexically, so output is stable
fn render_tags(tags: &Tags) -> String {
  let mut pairs: Vec<String> = tags.iter().map(|(k, v)| format!("Key={k},Value={v}")).collect();
  pairs.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
  pairs.join(" ")
}

/// Separate commands with a blank line
pub fn join_commands(commands: &[String]) -> String {
  commands.join("\n\n")
}
