use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{require_text, RuleEntity, RuleKind, ValidationError};
use super::meta::{trim_in_place, RuleMeta};

pub const AUTHORITY_WHITE: i32 = 0;
pub const AUTHORITY_BLACK: i32 = 1;

/// Origin-based access control rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityRuleEntity {
    #[serde(flatten)]
    pub meta: RuleMeta,

    #[serde(default)]
    pub resource: Option<String>,

    /// Comma-separated caller origins
    #[serde(default)]
    pub limit_app: Option<String>,

    /// 0 whitelist, 1 blacklist
    #[serde(default)]
    pub strategy: Option<i32>,
}

impl AuthorityRuleEntity {
    /// Origins listed in `limit_app`.
    pub fn origins(&self) -> Vec<&str> {
        self.limit_app
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn normalize(&mut self) {
        trim_in_place(&mut self.resource);
        if self.limit_app.is_some() {
            self.limit_app = Some(self.origins().join(","));
        }
    }
}

impl RuleEntity for AuthorityRuleEntity {
    const KIND: RuleKind = RuleKind::Authority;

    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RuleMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text(self.resource.as_deref(), "resource")?;
        require_text(self.limit_app.as_deref(), "limitApp")?;
        if self.origins().is_empty() {
            return Err(ValidationError::new("limitApp can't be null or empty"));
        }
        match self.strategy {
            Some(AUTHORITY_WHITE) | Some(AUTHORITY_BLACK) => Ok(()),
            _ => Err(ValidationError::new("Unknown authority strategy")),
        }
    }

    fn pre_save(&mut self, now: DateTime<Utc>) {
        self.meta.stamp_created(now);
        self.normalize();
    }

    fn pre_update(&mut self, id: i64, old: &Self, now: DateTime<Utc>) {
        self.meta.stamp_updated(id, &old.meta, now);
        self.normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist(origins: &str) -> AuthorityRuleEntity {
        AuthorityRuleEntity {
            meta: RuleMeta::for_app("demo"),
            resource: Some("foo".to_string()),
            limit_app: Some(origins.to_string()),
            strategy: Some(AUTHORITY_WHITE),
        }
    }

    #[test]
    fn test_valid_rule_passes() {
        assert!(whitelist("appA,appB").check().is_ok());
    }

    #[test]
    fn test_unknown_strategy() {
        let mut rule = whitelist("appA");
        rule.strategy = Some(2);
        assert_eq!(
            rule.check().unwrap_err().to_string(),
            "Unknown authority strategy"
        );
    }

    #[test]
    fn test_only_separators_rejected() {
        let rule = whitelist(" , ,");
        assert_eq!(
            rule.check().unwrap_err().to_string(),
            "limitApp can't be null or empty"
        );
    }

    #[test]
    fn test_pre_save_normalizes_origins() {
        let mut rule = whitelist(" appA , ,appB ");
        rule.pre_save(Utc::now());

        assert_eq!(rule.limit_app.as_deref(), Some("appA,appB"));
        assert_eq!(rule.origins(), vec!["appA", "appB"]);
    }
}
