use std::{
  collections::BTreeMap,
  fs,
  path::{Path, PathBuf},
  str,
};

use anyhow::{Context, Result, bail};
use handlebars::Handlebars;
use rust_embed::RustEmbed;
use serde::Serialize;
use tracing::debug;

#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

/// AWS managed policies backing the hosted control plane account roles
const DEFAULT_MANAGED_POLICIES: &[(&str, &str)] = &[
  ("sts_hcp_installer_permission_policy", "ROSAInstallerPolicy"),
  ("sts_hcp_support_permission_policy", "ROSASRESupportPolicy"),
  ("sts_hcp_instance_worker_permission_policy", "ROSAWorkerInstancePolicy"),
];

/// Values substituted into policy documents
#[derive(Clone, Debug, Serialize)]
pub struct PolicyVars {
  pub partition: String,
  pub aws_account_id: String,
}

/// Source of trust and permission policy documents
///
/// Documents come from an override directory when one is given and holds the file,
/// otherwise from the defaults embedded in the binary
#[derive(Clone, Debug, Default)]
pub struct PolicyTemplates {
  dir: Option<PathBuf>,
  managed_policy_arns: BTreeMap<String, String>,
}

impl PolicyTemplates {
  pub fn new(dir: Option<PathBuf>, managed_policy_arns: BTreeMap<String, String>) -> Self {
    Self {
      dir,
      managed_policy_arns,
    }
  }

  /// Raw document for the policy key (e.g. `sts_installer_trust_policy`)
  pub fn document(&self, key: &str) -> Result<String> {
    let filename = format!("{key}.json");

    if let Some(dir) = &self.dir {
      let path = dir.join(&filename);
      if path.exists() {
        debug!("Reading policy document '{}'", path.display());
        return fs::read_to_string(&path).with_context(|| format!("Failed to read policy document: {}", path.display()));
      }
    }

    match Templates::get(&format!("policies/{filename}")) {
      Some(file) => Ok(str::from_utf8(file.data.as_ref())?.to_string()),
      None => bail!("Policy document '{key}' not found"),
    }
  }

  /// Document with `{{partition}}` and `{{aws_account_id}}` substituted
  pub fn render(&self, key: &str, vars: &PolicyVars) -> Result<String> {
    let document = self.document(key)?;

    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
      .render_template(&document, vars)
      .with_context(|| format!("Failed to render policy document '{key}'"))
  }

  /// ARN of the AWS managed policy that stands in for the policy key
  pub fn managed_policy_arn(&self, key: &str, partition: &str) -> Result<String> {
    if let Some(arn) = self.managed_policy_arns.get(key) {
      return Ok(arn.clone());
    }

    match DEFAULT_MANAGED_POLICIES.iter().find(|(k, _)| *k == key) {
      Some((_, name)) => Ok(format!("arn:{partition}:iam::aws:policy/service-role/{name}")),
      None => bail!("No managed policy is configured for '{key}'; set it under 'managed_policy_arns' in the config file"),
    }
  }
}

/// Save rendered documents as `<key>.json` for use with the generated `aws` commands
pub fn write_policy_files(templates: &PolicyTemplates, dir: &Path, keys: &[String], vars: &PolicyVars) -> Result<Vec<PathBuf>> {
  let mut written = Vec::with_capacity(keys.len());

  for key in keys {
    let document = templates.render(key, vars)?;
    let path = dir.join(format!("{key}.json"));
    debug!("Saving '{}'", path.display());
    fs::write(&path, document).with_context(|| format!("Failed to write policy document: {}", path.display()))?;
    written.push(path);
  }

  Ok(written)
}
