use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Json, Path};
use serde::Deserialize;

use crate::controller::ControllerError;
use crate::domain::RuleEntity;

/// Query string of the list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct AppQuery {
    #[serde(default)]
    pub app: Option<String>,
}

/// Unwrap a rule body, turning a framework rejection into a validation
/// failure so it still answers with the result envelope.
pub fn rule_body<T: RuleEntity>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, ControllerError> {
    match body {
        Ok(Json(entity)) => Ok(entity),
        Err(JsonRejection::MissingJsonContentType(_)) => {
            Err(ControllerError::invalid("invalid body: expected application/json"))
        }
        Err(rejection) => Err(ControllerError::Validation(format!(
            "invalid body: {}",
            rejection.body_text()
        ))),
    }
}

/// Path id, or `None` when it is not a number.
pub fn path_id(id: Result<Path<i64>, PathRejection>) -> Option<i64> {
    id.ok().map(|Path(id)| id)
}
