use std::collections::BTreeMap;

/// Key/value tags attached to an IAM role or policy
pub type Tags = BTreeMap<String, String>;

/// Release train the role or policy was created for
pub const OPENSHIFT_VERSION: &str = "rosa_openshift_version";
/// Prefix shared by a set of account roles
pub const ROLE_PREFIX: &str = "rosa_role_prefix";
/// Purpose of the role (`installer`, `support`, ...)
pub const ROLE_TYPE: &str = "rosa_role_type";
/// Role permissions are provided by AWS managed policies
pub const MANAGED_POLICIES: &str = "rosa_managed_policies";
/// Role permissions are the hosted control plane policy set
pub const HCP_POLICIES: &str = "rosa_hcp_policies";
pub const RED_HAT_MANAGED: &str = "red-hat-managed";

pub const TRUE: &str = "true";

pub fn extract_version(tags: &Tags) -> Option<&str> {
  tags.get(OPENSHIFT_VERSION).map(String::as_str)
}

pub fn extract_role_type(tags: &Tags) -> Option<&str> {
  tags.get(ROLE_TYPE).map(String::as_str)
}

pub fn has_managed_policies(tags: &Tags) -> bool {
  is_true(tags, MANAGED_POLICIES)
}

pub fn has_hosted_cp_policies(tags: &Tags) -> bool {
  is_true(tags, HCP_POLICIES)
}

fn is_true(tags: &Tags, key: &str) -> bool {
  tags.get(key).is_some_and(|value| value == TRUE)
}
