use thiserror::Error;

/// Domain error kinds surfaced by the IAM client
///
/// The SDK reports failures as service specific error codes; these are collapsed into
/// the small set of kinds the role and policy logic actually branches on
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IamError {
  #[error("{resource} not found: {message}")]
  NotFound { resource: String, message: String },

  #[error("{resource} already exists: {message}")]
  AlreadyExists { resource: String, message: String },

  #[error("access denied on {resource}: {message}")]
  AccessDenied { resource: String, message: String },

  #[error("request throttled on {resource}: {message}")]
  Throttled { resource: String, message: String },

  #[error("{resource}: {message}")]
  Other { resource: String, message: String },
}

impl IamError {
  /// Map an AWS error code onto a domain error kind
  pub fn from_code(code: Option<&str>, resource: &str, message: impl Into<String>) -> Self {
    let resource = resource.to_string();
    let message = message.into();

    match code.unwrap_or_default() {
      "NoSuchEntity" | "NoSuchEntityException" => IamError::NotFound { resource, message },
      "EntityAlreadyExists" | "EntityAlreadyExistsException" => IamError::AlreadyExists { resource, message },
      "Throttling" | "ThrottlingException" | "RequestLimitExceeded" => IamError::Throttled { resource, message },
      code if code.starts_with("AccessDenied") || code == "UnauthorizedOperation" => {
        IamError::AccessDenied { resource, message }
      }
      _ => IamError::Other { resource, message },
    }
  }
}

/// Returns true when the error chain carries an [`IamError::NotFound`]
pub fn is_not_found(err: &anyhow::Error) -> bool {
  matches!(err.downcast_ref::<IamError>(), Some(IamError::NotFound { .. }))
}

/// Returns true when the error chain carries an [`IamError::AlreadyExists`]
pub fn is_already_exists(err: &anyhow::Error) -> bool {
  matches!(err.downcast_ref::<IamError>(), Some(IamError::AlreadyExists { .. }))
}

/// Returns true when the error chain carries an [`IamError::Throttled`]
pub fn is_throttled(err: &anyhow::Error) -> bool {
  matches!(err.downcast_ref::<IamError>(), Some(IamError::Throttled { .. }))
}
