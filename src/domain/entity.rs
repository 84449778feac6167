use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use thiserror::Error;

use super::meta::{is_blank, RuleMeta};

/// A rule failed structural validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError(message.into())
    }
}

/// Reject a missing or blank text field.
pub(crate) fn require_text(value: Option<&str>, field: &str) -> Result<(), ValidationError> {
    if is_blank(value) {
        return Err(ValidationError(format!("{field} can't be null or empty")));
    }
    Ok(())
}

/// Rule kind identifier, also the path segment and rule-source key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Flow,
    Degrade,
    System,
    Authority,
    ParamFlow,
}

impl RuleKind {
    pub const ALL: [RuleKind; 5] = [
        RuleKind::Flow,
        RuleKind::Degrade,
        RuleKind::System,
        RuleKind::Authority,
        RuleKind::ParamFlow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Flow => "flow",
            RuleKind::Degrade => "degrade",
            RuleKind::System => "system",
            RuleKind::Authority => "authority",
            RuleKind::ParamFlow => "param-flow",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities the generic controller needs from a rule kind.
///
/// The default hooks cover the shared metadata; kinds override them to
/// normalise their own fields and call back into the default handling.
pub trait RuleEntity:
    Debug + Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const KIND: RuleKind;

    fn meta(&self) -> &RuleMeta;

    fn meta_mut(&mut self) -> &mut RuleMeta;

    /// Kind-specific checks. The app check is done by [`RuleEntity::check`].
    fn validate(&self) -> Result<(), ValidationError>;

    /// Normalise a freshly submitted rule before its first save.
    fn pre_save(&mut self, now: DateTime<Utc>) {
        self.meta_mut().stamp_created(now);
    }

    /// Normalise a replacement body against the stored record.
    fn pre_update(&mut self, id: i64, old: &Self, now: DateTime<Utc>) {
        self.meta_mut().stamp_updated(id, old.meta(), now);
    }

    /// Full structural check: app first, then the kind profile.
    fn check(&self) -> Result<(), ValidationError> {
        if self.meta().app_is_blank() {
            return Err(ValidationError::new("app can't be null or empty"));
        }
        self.validate()
    }

    fn id(&self) -> Option<i64> {
        self.meta().id
    }

    fn app(&self) -> &str {
        self.meta().app_name()
    }
}
