use thiserror::Error;

use crate::auth::AuthError;
use crate::domain::ValidationError;
use crate::observability::FailureClass;

/// Failure of a controller operation.
///
/// `Validation`, `NotFound` and `Auth` are raised before any side effect.
/// The collaborator variants may follow a local write that was not rolled
/// back, so callers must treat them as possibly partially applied.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("{0}")]
    Validation(String),

    #[error("id {0} does not exist")]
    NotFound(i64),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("fetch rules from rule source failed: {0:#}")]
    Provider(anyhow::Error),

    #[error("save entity fail: {0:#}")]
    Repository(anyhow::Error),

    #[error("publish rules failed: {0:#}")]
    Publish(anyhow::Error),
}

impl ControllerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ControllerError::Validation(message.into())
    }

    /// Metrics label for this failure.
    pub fn class(&self) -> FailureClass {
        match self {
            ControllerError::Validation(_) => FailureClass::Validation,
            ControllerError::NotFound(_) => FailureClass::NotFound,
            ControllerError::Auth(_) => FailureClass::Auth,
            ControllerError::Provider(_)
            | ControllerError::Repository(_)
            | ControllerError::Publish(_) => FailureClass::Collaborator,
        }
    }
}

impl From<ValidationError> for ControllerError {
    fn from(err: ValidationError) -> Self {
        ControllerError::Validation(err.0)
    }
}
