use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from `.rosa-roles.yaml` or an explicit path.
///
/// Every field can be overridden by the matching command line flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
  /// Environment whose jump account is trusted by the installer and support roles.
  #[serde(default = "default_env")]
  pub env: String,

  /// AWS partition used when building ARNs.
  #[serde(default = "default_partition")]
  pub partition: String,

  /// Default prefix for the account role names.
  #[serde(default = "default_prefix")]
  pub prefix: String,

  /// IAM path the roles and policies are created under.
  #[serde(default = "default_path")]
  pub path: String,

  /// ARN of the policy used as permissions boundary for the roles.
  #[serde(default)]
  pub permissions_boundary: Option<String>,

  /// Policy version used when `--version` is not given.
  #[serde(default)]
  pub default_version: Option<String>,

  /// Directory with policy documents overriding the built-in ones.
  #[serde(default)]
  pub policy_dir: Option<PathBuf>,

  /// AWS managed policy ARNs keyed by permission policy name
  /// (e.g. `sts_hcp_installer_permission_policy`).
  #[serde(default)]
  pub managed_policy_arns: BTreeMap<String, String>,
}

fn default_env() -> String {
  "production".to_string()
}

fn default_partition() -> String {
  "aws".to_string()
}

fn default_prefix() -> String {
  "ManagedOpenShift".to_string()
}

fn default_path() -> String {
  "/".to_string()
}

impl Default for Config {
  fn default() -> Self {
    Self {
      env: default_env(),
      partition: default_partition(),
      prefix: default_prefix(),
      path: default_path(),
      permissions_boundary: None,
      default_version: None,
      policy_dir: None,
      managed_policy_arns: BTreeMap::new(),
    }
  }
}

const DEFAULT_CONFIG_FILE: &str = ".rosa-roles.yaml";

/// Load configuration from an explicit path, the default `.rosa-roles.yaml` in the
/// current working directory, or fall back to `Config::default()`.
pub fn load(path: Option<&str>) -> Result<Config> {
  load_from(path, std::env::current_dir().ok().as_deref())
}

fn load_from(path: Option<&str>, base_dir: Option<&std::path::Path>) -> Result<Config> {
  if let Some(p) = path {
    let contents = std::fs::read_to_string(p).with_context(|| format!("Failed to read config file: {p}"))?;
    let config: Config =
      serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config file: {p}"))?;
    return Ok(config);
  }

  // Try default path in base directory
  if let Some(dir) = base_dir {
    let default_path = dir.join(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
      let contents = std::fs::read_to_string(&default_path)
        .with_context(|| format!("Failed to read config file: {}", default_path.display()))?;
      let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", default_path.display()))?;
      return Ok(config);
    }
  }

  Ok(Config::default())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn config_default() {
    let cfg = Config::default();
    assert_eq!(cfg.env, "production");
    assert_eq!(cfg.partition, "aws");
    assert_eq!(cfg.prefix, "ManagedOpenShift");
    assert_eq!(cfg.path, "/");
    assert!(cfg.permissions_boundary.is_none());
    assert!(cfg.managed_policy_arns.is_empty());
  }

  #[test]
  fn deserialize_empty_yaml() {
    let cfg: Config = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg.env, "production");
    assert_eq!(cfg.path, "/");
  }

  #[test]
  fn deserialize_full_yaml() {
    let yaml = r#"
env: staging
partition: aws-us-gov
prefix: Team
path: /rosa/
permissions_boundary: arn:aws:iam::123456789012:policy/boundary
default_version: "4.14"
policy_dir: ./policies
managed_policy_arns:
  sts_installer_permission_policy: arn:aws:iam::aws:policy/custom
"#;
    let cfg: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.env, "staging");
    assert_eq!(cfg.partition, "aws-us-gov");
    assert_eq!(cfg.prefix, "Team");
    assert_eq!(cfg.path, "/rosa/");
    assert_eq!(cfg.permissions_boundary.as_deref(), Some("arn:aws:iam::123456789012:policy/boundary"));
    assert_eq!(cfg.default_version.as_deref(), Some("4.14"));
    assert_eq!(cfg.policy_dir, Some(PathBuf::from("./policies")));
    assert_eq!(cfg.managed_policy_arns.len(), 1);
  }

  #[test]
  fn load_no_path_no_default_file() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = load_from(None, Some(tmp.path())).unwrap();
    assert_eq!(cfg.env, "production");
  }

  #[test]
  fn load_explicit_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("my-config.yaml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "env: integration").unwrap();

    let cfg = load_from(Some(path.to_str().unwrap()), None).unwrap();
    assert_eq!(cfg.env, "integration");
  }

  #[test]
  fn load_explicit_path_not_found() {
    let result = load_from(Some("/tmp/does-not-exist-rosa-roles-test.yaml"), None);
    assert!(result.is_err());
  }

  #[test]
  fn load_invalid_yaml() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bad.yaml");
    std::fs::write(&path, "env: [unterminated").unwrap();

    assert!(load_from(Some(path.to_str().unwrap()), None).is_err());
  }

  #[test]
  fn load_default_file_in_base_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let default_path = tmp.path().join(".rosa-roles.yaml");
    let mut f = std::fs::File::create(&default_path).unwrap();
    writeln!(f, "prefix: FromFile").unwrap();

    let cfg = load_from(None, Some(tmp.path())).unwrap();
    assert_eq!(cfg.prefix, "FromFile");
  }

  #[test]
  fn load_no_base_dir_returns_default() {
    let cfg = load_from(None, None).unwrap();
    assert_eq!(cfg.prefix, "ManagedOpenShift");
  }
}
