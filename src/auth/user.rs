use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope checked for each rule operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeType {
    ReadRule,
    WriteRule,
    DeleteRule,
    /// Grants every privilege on the app
    All,
}

impl fmt::Display for PrivilegeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivilegeType::ReadRule => write!(f, "READ_RULE"),
            PrivilegeType::WriteRule => write!(f, "WRITE_RULE"),
            PrivilegeType::DeleteRule => write!(f, "DELETE_RULE"),
            PrivilegeType::All => write!(f, "ALL"),
        }
    }
}

/// Resolved caller identity.
#[derive(Debug, Clone, Default)]
pub struct AuthUser {
    pub login_name: String,
    pub super_user: bool,
    grants: AHashMap<String, AHashSet<PrivilegeType>>,
}

impl AuthUser {
    pub fn new(login_name: impl Into<String>) -> Self {
        AuthUser {
            login_name: login_name.into(),
            ..Default::default()
        }
    }

    /// A user allowed everything on every app.
    pub fn super_user(login_name: impl Into<String>) -> Self {
        AuthUser {
            login_name: login_name.into(),
            super_user: true,
            grants: AHashMap::new(),
        }
    }

    /// Grant privileges on one app.
    pub fn grant(
        mut self,
        app: impl Into<String>,
        privileges: impl IntoIterator<Item = PrivilegeType>,
    ) -> Self {
        self.grants
            .entry(app.into())
            .or_default()
            .extend(privileges);
        self
    }

    /// Whether this user may perform `privilege` on `app`.
    pub fn auth_target(&self, app: &str, privilege: PrivilegeType) -> bool {
        if self.super_user {
            return true;
        }
        self.grants
            .get(app)
            .map(|granted| granted.contains(&privilege) || granted.contains(&PrivilegeType::All))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_super_user_passes_everything() {
        let user = AuthUser::super_user("admin");
        assert!(user.auth_target("any", PrivilegeType::DeleteRule));
    }

    #[test]
    fn test_grants_are_per_app() {
        let user = AuthUser::new("ops").grant("demo", [PrivilegeType::ReadRule]);

        assert!(user.auth_target("demo", PrivilegeType::ReadRule));
        assert!(!user.auth_target("demo", PrivilegeType::WriteRule));
        assert!(!user.auth_target("other", PrivilegeType::ReadRule));
    }

    #[test]
    fn test_all_implies_each_privilege() {
        let user = AuthUser::new("ops").grant("demo", [PrivilegeType::All]);

        assert!(user.auth_target("demo", PrivilegeType::WriteRule));
        assert!(user.auth_target("demo", PrivilegeType::DeleteRule));
    }

    #[test]
    fn test_privilege_display() {
        assert_eq!(PrivilegeType::WriteRule.to_string(), "WRITE_RULE");
    }
}
