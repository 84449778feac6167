use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use crate::controller::ControllerError;

/// Envelope code for a successful call.
pub const CODE_SUCCESS: i32 = 0;
/// Envelope code for any failure.
pub const CODE_FAIL: i32 = -1;

/// Result envelope returned by every rule endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult<T> {
    pub success: bool,
    pub code: i32,
    pub msg: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiResult<T> {
    pub fn ok(data: T) -> Self {
        ApiResult {
            success: true,
            code: CODE_SUCCESS,
            msg: None,
            data: Some(data),
        }
    }

    /// Success without a payload.
    pub fn ok_empty() -> Self {
        ApiResult {
            success: true,
            code: CODE_SUCCESS,
            msg: None,
            data: None,
        }
    }

    pub fn fail(code: i32, msg: impl Into<String>) -> Self {
        ApiResult {
            success: false,
            code,
            msg: Some(msg.into()),
            data: None,
        }
    }
}

/// Turn a controller outcome into an HTTP response.
///
/// Only authentication and authorization failures change the status
/// code; everything else travels in the envelope with a 200.
pub fn into_response<T: Serialize>(result: Result<T, ControllerError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResult::ok(data))).into_response(),
        Err(err) => failure_response(&err),
    }
}

pub fn failure_response(err: &ControllerError) -> Response {
    let status = match err {
        ControllerError::Auth(AuthError::Unauthenticated) => StatusCode::UNAUTHORIZED,
        ControllerError::Auth(AuthError::Forbidden { .. }) => StatusCode::FORBIDDEN,
        _ => StatusCode::OK,
    };
    (
        status,
        Json(ApiResult::<()>::fail(CODE_FAIL, err.to_string())),
    )
        .into_response()
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FlowRuleEntity;

    #[test]
    fn test_success_envelope() {
        let json = serde_json::to_value(ApiResult::ok(5i64)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["code"], 0);
        assert_eq!(json["data"], 5);
        assert!(json["msg"].is_null());
    }

    #[test]
    fn test_empty_success_has_null_data() {
        let json = serde_json::to_value(ApiResult::<i64>::ok_empty()).unwrap();

        assert_eq!(json["success"], true);
        assert!(json["data"].is_null());
    }

    #[test]
    fn test_rule_payload_is_camel_case() {
        let result = ApiResult::ok(vec![FlowRuleEntity::qps("demo", "foo", 1.0)]);
        let json = serde_json::to_value(result).unwrap();

        assert_eq!(json["data"][0]["limitApp"], "default");
        assert_eq!(json["data"][0]["app"], "demo");
    }

    #[test]
    fn test_failure_status_codes() {
        let resp = failure_response(&ControllerError::invalid("bad"));
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = failure_response(&ControllerError::Auth(AuthError::Unauthenticated));
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = failure_response(&ControllerError::Auth(AuthError::Forbidden {
            user: "u".to_string(),
            app: "demo".to_string(),
            privilege: crate::auth::PrivilegeType::ReadRule,
        }));
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
