use axum::http::{header, HeaderMap};
use thiserror::Error;

use super::user::{AuthUser, PrivilegeType};

/// Authentication and authorization failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("user {user} lacks {privilege} on app {app}")]
    Forbidden {
        user: String,
        app: String,
        privilege: PrivilegeType,
    },
}

/// Resolves callers and checks their privileges.
pub trait AuthService: Send + Sync {
    /// Identify the caller from request headers.
    fn resolve(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError>;

    /// Check `user` may perform `privilege` on `app`.
    fn authorize(
        &self,
        user: &AuthUser,
        app: &str,
        privilege: PrivilegeType,
    ) -> Result<(), AuthError> {
        if user.auth_target(app, privilege) {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                user: user.login_name.clone(),
                app: app.to_string(),
                privilege,
            })
        }
    }
}

/// Treats every caller as an anonymous super user.
///
/// Used when no users file is configured.
#[derive(Debug, Default, Clone)]
pub struct AllowAllAuthService;

impl AuthService for AllowAllAuthService {
    fn resolve(&self, _headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        Ok(AuthUser::super_user("anonymous"))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
