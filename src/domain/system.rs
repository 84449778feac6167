use serde::{Deserialize, Serialize};

use super::entity::{RuleEntity, RuleKind, ValidationError};
use super::meta::RuleMeta;

/// System adaptive protection rule.
///
/// Exactly one threshold is active per rule. A negative value marks a
/// threshold as disabled, the same as leaving it out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRuleEntity {
    #[serde(flatten)]
    pub meta: RuleMeta,

    /// Load average threshold
    #[serde(default)]
    pub highest_system_load: Option<f64>,

    #[serde(default)]
    pub avg_rt: Option<i64>,

    #[serde(default)]
    pub max_thread: Option<i64>,

    #[serde(default)]
    pub qps: Option<f64>,

    /// CPU usage ratio in [0, 1]
    #[serde(default)]
    pub highest_cpu_usage: Option<f64>,
}

impl SystemRuleEntity {
    /// Number of thresholds set to a usable value.
    pub fn active_thresholds(&self) -> usize {
        [
            self.highest_system_load.filter(|v| *v >= 0.0).is_some(),
            self.avg_rt.filter(|v| *v >= 0).is_some(),
            self.max_thread.filter(|v| *v >= 0).is_some(),
            self.qps.filter(|v| *v >= 0.0).is_some(),
            self.highest_cpu_usage.filter(|v| *v >= 0.0).is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

impl RuleEntity for SystemRuleEntity {
    const KIND: RuleKind = RuleKind::System;

    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RuleMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let active = self.active_thresholds();
        if active != 1 {
            return Err(ValidationError(format!(
                "only one of [highestSystemLoad, avgRt, maxThread, qps, highestCpuUsage] \
                 value must be set > 0, but {active} values get"
            )));
        }
        if matches!(self.highest_cpu_usage, Some(cpu) if cpu > 1.0) {
            return Err(ValidationError::new(
                "highestCpuUsage must between [0.0, 1.0]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qps_rule(qps: f64) -> SystemRuleEntity {
        SystemRuleEntity {
            meta: RuleMeta::for_app("demo"),
            qps: Some(qps),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_threshold_passes() {
        assert!(qps_rule(100.0).check().is_ok());
    }

    #[test]
    fn test_two_thresholds_rejected() {
        let mut rule = qps_rule(100.0);
        rule.highest_system_load = Some(4.0);

        let err = rule.check().unwrap_err();
        assert!(err.to_string().contains("but 2 values get"));
    }

    #[test]
    fn test_no_threshold_rejected() {
        let rule = SystemRuleEntity {
            meta: RuleMeta::for_app("demo"),
            ..Default::default()
        };

        let err = rule.check().unwrap_err();
        assert!(err.to_string().contains("but 0 values get"));
    }

    #[test]
    fn test_negative_threshold_counts_as_unset() {
        let mut rule = qps_rule(100.0);
        rule.avg_rt = Some(-1);

        assert_eq!(rule.active_thresholds(), 1);
        assert!(rule.check().is_ok());
    }

    #[test]
    fn test_cpu_usage_bound() {
        let rule = SystemRuleEntity {
            meta: RuleMeta::for_app("demo"),
            highest_cpu_usage: Some(1.5),
            ..Default::default()
        };

        assert_eq!(
            rule.check().unwrap_err().to_string(),
            "highestCpuUsage must between [0.0, 1.0]"
        );
    }

    #[test]
    fn test_deserialize_avg_load() {
        let json = r#"{"app":"demo","highestSystemLoad":2.5}"#;
        let rule: SystemRuleEntity = serde_json::from_str(json).unwrap();

        assert_eq!(rule.highest_system_load, Some(2.5));
        assert!(rule.check().is_ok());
    }
}
