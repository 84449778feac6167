use ahash::AHashMap;
use axum::http::HeaderMap;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::service::{bearer_token, AuthError, AuthService};
use super::user::{AuthUser, PrivilegeType};

/// Errors that can occur while loading the users file.
#[derive(Error, Debug)]
pub enum AuthConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Users file layout.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersFile {
    #[serde(default)]
    pub users: Vec<UserDef>,
}

/// One user entry.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDef {
    pub login_name: String,

    /// Bearer token identifying the user
    pub token: String,

    #[serde(default)]
    pub super_user: bool,

    /// App name to granted privileges
    #[serde(default)]
    pub apps: HashMap<String, Vec<PrivilegeType>>,
}

/// Load and validate a users file.
pub fn load_users(path: impl AsRef<Path>) -> Result<UsersFile, AuthConfigError> {
    let content = fs::read_to_string(path)?;
    let users: UsersFile = serde_yaml::from_str(&content)?;

    validate_users(&users)?;

    Ok(users)
}

fn validate_users(file: &UsersFile) -> Result<(), AuthConfigError> {
    let mut names = HashSet::new();
    let mut tokens = HashSet::new();

    for user in &file.users {
        if user.login_name.trim().is_empty() {
            return Err(AuthConfigError::Validation(
                "login_name cannot be empty".to_string(),
            ));
        }
        if user.token.trim().is_empty() {
            return Err(AuthConfigError::Validation(format!(
                "token for {} cannot be empty",
                user.login_name
            )));
        }
        if !names.insert(&user.login_name) {
            return Err(AuthConfigError::Validation(format!(
                "Duplicate user: {}",
                user.login_name
            )));
        }
        if !tokens.insert(&user.token) {
            return Err(AuthConfigError::Validation(format!(
                "Token of {} is already assigned to another user",
                user.login_name
            )));
        }
    }

    Ok(())
}

/// Token-based auth over a fixed set of users.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthService {
    by_token: AHashMap<String, AuthUser>,
}

impl StaticAuthService {
    /// Build from a parsed users file.
    pub fn from_users(file: UsersFile) -> Self {
        let by_token = file
            .users
            .into_iter()
            .map(|def| {
                let mut user = if def.super_user {
                    AuthUser::super_user(def.login_name)
                } else {
                    AuthUser::new(def.login_name)
                };
                for (app, privileges) in def.apps {
                    user = user.grant(app, privileges);
                }
                (def.token, user)
            })
            .collect();

        StaticAuthService { by_token }
    }

    /// Load users from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthConfigError> {
        Ok(Self::from_users(load_users(path)?))
    }

    pub fn user_count(&self) -> usize {
        self.by_token.len()
    }
}

impl AuthService for StaticAuthService {
    fn resolve(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        bearer_token(headers)
            .and_then(|token| self.by_token.get(token))
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const USERS: &str = r#"
users:
  - login_name: admin
    token: admin-token
    super_user: true
  - login_name: ops
    token: ops-token
    apps:
      demo: [read_rule, write_rule]
"#;

    fn headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_load_users_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{USERS}").unwrap();

        let service = StaticAuthService::load(file.path()).unwrap();
        assert_eq!(service.user_count(), 2);

        let admin = service.resolve(&headers("admin-token")).unwrap();
        assert!(admin.super_user);

        let ops = service.resolve(&headers("ops-token")).unwrap();
        assert_eq!(ops.login_name, "ops");
        assert!(service.authorize(&ops, "demo", PrivilegeType::WriteRule).is_ok());
        assert!(matches!(
            service.authorize(&ops, "demo", PrivilegeType::DeleteRule),
            Err(AuthError::Forbidden { .. })
        ));
    }

    #[test]
    fn test_unknown_token_is_unauthenticated() {
        let users: UsersFile = serde_yaml::from_str(USERS).unwrap();
        let service = StaticAuthService::from_users(users);

        assert_eq!(
            service.resolve(&headers("nope")).unwrap_err(),
            AuthError::Unauthenticated
        );
        assert_eq!(
            service.resolve(&HeaderMap::new()).unwrap_err(),
            AuthError::Unauthenticated
        );
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let yaml = r#"
users:
  - login_name: a
    token: same
  - login_name: b
    token: same
"#;
        let users: UsersFile = serde_yaml::from_str(yaml).unwrap();
        let err = validate_users(&users).unwrap_err();

        assert!(matches!(err, AuthConfigError::Validation(_)));
    }

    #[test]
    fn test_missing_file() {
        let result = load_users("/nonexistent/users.yaml");
        assert!(matches!(result, Err(AuthConfigError::Io(_))));
    }
}
