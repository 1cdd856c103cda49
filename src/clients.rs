use anyhow::Result;

use crate::{
  iam::resources::{self as iam_resources, AttachedPolicy, CreatePolicyInput, CreateRoleInput, IamRole},
  tags::Tags,
};

/// Trait abstracting all AWS API operations used by rosa-roles
pub trait IamClients {
  fn get_caller_account_id(&self) -> impl std::future::Future<Output = Result<String>> + Send;
  fn get_role(&self, name: &str) -> impl std::future::Future<Output = Result<Option<IamRole>>> + Send;
  fn list_roles(&self) -> impl std::future::Future<Output = Result<Vec<IamRole>>> + Send;
  fn list_role_tags(&self, name: &str) -> impl std::future::Future<Output = Result<Tags>> + Send;
  fn create_role(&self, input: &CreateRoleInput) -> impl std::future::Future<Output = Result<String>> + Send;
  fn update_assume_role_policy(&self, name: &str, document: &str) -> impl std::future::Future<Output = Result<()>> + Send;
  fn put_role_permissions_boundary(&self, name: &str, boundary: &str) -> impl std::future::Future<Output = Result<()>> + Send;
  fn delete_role_permissions_boundary(&self, name: &str) -> impl std::future::Future<Output = Result<()>> + Send;
  fn tag_role(&self, name: &str, tags: &Tags) -> impl std::future::Future<Output = Result<()>> + Send;
  fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> impl std::future::Future<Output = Result<()>> + Send;
  fn list_attached_role_policies(&self, role_name: &str) -> impl std::future::Future<Output = Result<Vec<AttachedPolicy>>> + Send;
  fn list_policy_tags(&self, policy_arn: &str) -> impl std::future::Future<Output = Result<Tags>> + Send;
  fn create_policy(&self, input: &CreatePolicyInput) -> impl std::future::Future<Output = Result<String>> + Send;
  fn create_policy_version(&self, policy_arn: &str, document: &str) -> impl std::future::Future<Output = Result<()>> + Send;
  fn tag_policy(&self, policy_arn: &str, tags: &Tags) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Real AWS client implementation wrapping the SDK clients
pub struct RealIamClients {
  iam: aws_sdk_iam::Client,
  sts: aws_sdk_sts::Client,
}

impl RealIamClients {
  pub fn new(config: &aws_config::SdkConfig) -> Self {
    Self {
      iam: aws_sdk_iam::Client::new(config),
      sts: aws_sdk_sts::Client::new(config),
    }
  }
}

impl IamClients for RealIamClients {
  async fn get_caller_account_id(&self) -> Result<String> {
    iam_resources::get_caller_account_id(&self.sts).await
  }

  async fn get_role(&self, name: &str) -> Result<Option<IamRole>> {
    iam_resources::get_role(&self.iam, name).await
  }

  async fn list_roles(&self) -> Result<Vec<IamRole>> {
    iam_resources::list_roles(&self.iam).await
  }

  async fn list_role_tags(&self, name: &str) -> Result<Tags> {
    iam_resources::list_role_tags(&self.iam, name).await
  }

  async fn create_role(&self, input: &CreateRoleInput) -> Result<String> {
    iam_resources::create_role(&self.iam, input).await
  }

  async fn update_assume_role_policy(&self, name: &str, document: &str) -> Result<()> {
    iam_resources::update_assume_role_policy(&self.iam, name, document).await
  }

  async fn put_role_permissions_boundary(&self, name: &str, boundary: &str) -> Result<()> {
    iam_resources::put_role_permissions_boundary(&self.iam, name, boundary).await
  }

  async fn delete_role_permissions_boundary(&self, name: &str) -> Result<()> {
    iam_resources::delete_role_permissions_boundary(&self.iam, name).await
  }

  async fn tag_role(&self, name: &str, tags: &Tags) -> Result<()> {
    iam_resources::tag_role(&self.iam, name, tags).await
  }

  async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
    iam_resources::attach_role_policy(&self.iam, role_name, policy_arn).await
  }

  async fn list_attached_role_policies(&self, role_name: &str) -> Result<Vec<AttachedPolicy>> {
    iam_resources::list_attached_role_policies(&self.iam, role_name).await
  }

  async fn list_policy_tags(&self, policy_arn: &str) -> Result<Tags> {
    iam_resources::list_policy_tags(&self.iam, policy_arn).await
  }

  async fn create_policy(&self, input: &CreatePolicyInput) -> Result<String> {
    iam_resources::create_policy(&self.iam, input).await
  }

  async fn create_policy_version(&self, policy_arn: &str, document: &str) -> Result<()> {
    iam_resources::create_policy_version(&self.iam, policy_arn, document).await
  }

  async fn tag_policy(&self, policy_arn: &str, tags: &Tags) -> Result<()> {
    iam_resources::tag_policy(&self.iam, policy_arn, tags).await
  }
}
