use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{require_text, RuleEntity, RuleKind, ValidationError};
use super::meta::{trim_in_place, RuleMeta};

/// Circuit breaker strategy: slow request ratio.
pub const DEGRADE_GRADE_RT: i32 = 0;
/// Circuit breaker strategy: exception ratio.
pub const DEGRADE_GRADE_EXCEPTION_RATIO: i32 = 1;
/// Circuit breaker strategy: exception count.
pub const DEGRADE_GRADE_EXCEPTION_COUNT: i32 = 2;

pub const DEFAULT_MIN_REQUEST_AMOUNT: i32 = 5;
pub const DEFAULT_STAT_INTERVAL_MS: i32 = 1000;

/// Circuit breaking rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradeRuleEntity {
    #[serde(flatten)]
    pub meta: RuleMeta,

    #[serde(default)]
    pub resource: Option<String>,

    #[serde(default)]
    pub limit_app: Option<String>,

    #[serde(default)]
    pub grade: Option<i32>,

    /// Max RT in ms (grade 0), ratio (grade 1) or count (grade 2)
    #[serde(default)]
    pub count: Option<f64>,

    /// Recovery timeout in seconds
    #[serde(default)]
    pub time_window: Option<i32>,

    #[serde(default)]
    pub min_request_amount: Option<i32>,

    #[serde(default)]
    pub slow_ratio_threshold: Option<f64>,

    #[serde(default)]
    pub stat_interval_ms: Option<i32>,
}

impl DegradeRuleEntity {
    fn normalize(&mut self) {
        trim_in_place(&mut self.resource);
        trim_in_place(&mut self.limit_app);
        self.min_request_amount
            .get_or_insert(DEFAULT_MIN_REQUEST_AMOUNT);
        self.stat_interval_ms.get_or_insert(DEFAULT_STAT_INTERVAL_MS);
    }
}

impl RuleEntity for DegradeRuleEntity {
    const KIND: RuleKind = RuleKind::Degrade;

    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RuleMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text(self.resource.as_deref(), "resource")?;
        require_text(self.limit_app.as_deref(), "limitApp")?;

        let count = match self.count {
            Some(c) if c >= 0.0 => c,
            Some(c) => return Err(ValidationError(format!("invalid threshold: {c}"))),
            None => return Err(ValidationError::new("invalid threshold: null")),
        };

        if !matches!(self.time_window, Some(t) if t > 0) {
            return Err(ValidationError::new("recoveryTimeout should be positive"));
        }

        let grade = match self.grade {
            Some(g) if (DEGRADE_GRADE_RT..=DEGRADE_GRADE_EXCEPTION_COUNT).contains(&g) => g,
            Some(g) => {
                return Err(ValidationError(format!(
                    "Invalid circuit breaker strategy: {g}"
                )))
            }
            None => return Err(ValidationError::new("Invalid circuit breaker strategy: null")),
        };

        if matches!(self.min_request_amount, Some(n) if n <= 0) {
            return Err(ValidationError::new("Invalid minRequestAmount"));
        }
        if matches!(self.stat_interval_ms, Some(n) if n <= 0) {
            return Err(ValidationError::new("Invalid statInterval"));
        }

        match grade {
            DEGRADE_GRADE_RT => match self.slow_ratio_threshold {
                None => {
                    return Err(ValidationError::new(
                        "SlowRatioThreshold is required for slow request ratio strategy",
                    ))
                }
                Some(r) if !(0.0..=1.0).contains(&r) => {
                    return Err(ValidationError::new(
                        "SlowRatioThreshold should be in range: [0.0, 1.0]",
                    ))
                }
                Some(_) => {}
            },
            DEGRADE_GRADE_EXCEPTION_RATIO if count > 1.0 => {
                return Err(ValidationError::new(
                    "Ratio threshold should be in range: [0.0, 1.0]",
                ))
            }
            _ => {}
        }

        Ok(())
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

    fn slow_ratio_rule() -> DegradeRuleEntity {
        DegradeRuleEntity {
            meta: RuleMeta::for_app("demo"),
            resource: Some("GET:/orders".to_string()),
            limit_app: Some("default".to_string()),
            grade: Some(DEGRADE_GRADE_RT),
            count: Some(200.0),
            time_window: Some(10),
            slow_ratio_threshold: Some(0.5),
            ..Default::default()
        }
    }

    fn message(rule: &DegradeRuleEntity) -> String {
        rule.check().unwrap_err().to_string()
    }

    #[test]
    fn test_valid_rule_passes() {
        assert!(slow_ratio_rule().check().is_ok());
    }

    #[test]
    fn test_negative_time_window() {
        let mut rule = slow_ratio_rule();
        rule.time_window = Some(-5);
        assert_eq!(message(&rule), "recoveryTimeout should be positive");

        rule.time_window = None;
        assert_eq!(message(&rule), "recoveryTimeout should be positive");
    }

    #[test]
    fn test_negative_count() {
        let mut rule = slow_ratio_rule();
        rule.count = Some(-1.0);
        assert_eq!(message(&rule), "invalid threshold: -1");
    }

    #[test]
    fn test_unknown_strategy() {
        let mut rule = slow_ratio_rule();
        rule.grade = Some(3);
        assert_eq!(message(&rule), "Invalid circuit breaker strategy: 3");
    }

    #[test]
    fn test_slow_ratio_threshold_bounds() {
        let mut rule = slow_ratio_rule();
        rule.slow_ratio_threshold = None;
        assert_eq!(
            message(&rule),
            "SlowRatioThreshold is required for slow request ratio strategy"
        );

        rule.slow_ratio_threshold = Some(1.5);
        assert_eq!(
            message(&rule),
            "SlowRatioThreshold should be in range: [0.0, 1.0]"
        );
    }

    #[test]
    fn test_exception_ratio_bound() {
        let mut rule = slow_ratio_rule();
        rule.grade = Some(DEGRADE_GRADE_EXCEPTION_RATIO);
        rule.count = Some(1.2);
        assert_eq!(
            message(&rule),
            "Ratio threshold should be in range: [0.0, 1.0]"
        );

        rule.count = Some(0.3);
        assert!(rule.check().is_ok());
    }

    #[test]
    fn test_pre_save_fills_defaults() {
        let mut rule = slow_ratio_rule();
        rule.pre_save(Utc::now());

        assert_eq!(rule.min_request_amount, Some(DEFAULT_MIN_REQUEST_AMOUNT));
        assert_eq!(rule.stat_interval_ms, Some(DEFAULT_STAT_INTERVAL_MS));
    }
}
