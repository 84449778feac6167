use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{require_text, RuleEntity, RuleKind, ValidationError};
use super::flow::{
    ClusterFlowConfig, CONTROL_BEHAVIOR_DEFAULT, CONTROL_BEHAVIOR_RATE_LIMITER,
    FLOW_GRADE_QPS, FLOW_GRADE_THREAD,
};
use super::meta::{trim_in_place, RuleMeta};

/// Per-value threshold override for a hot parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamFlowItem {
    /// Parameter value, as text
    pub object: String,

    /// Declared value type, e.g. `int` or `String`
    pub class_type: String,

    pub count: i32,
}

impl ParamFlowItem {
    /// Check the declared type is known and the value parses as it.
    pub fn is_valid(&self) -> bool {
        if self.count < 0 {
            return false;
        }
        let value = self.object.as_str();
        match self.class_type.trim_start_matches("java.lang.") {
            "int" | "Integer" => value.parse::<i32>().is_ok(),
            "long" | "Long" => value.parse::<i64>().is_ok(),
            "short" | "Short" => value.parse::<i16>().is_ok(),
            "byte" | "Byte" => value.parse::<i8>().is_ok(),
            "double" | "Double" => value.parse::<f64>().is_ok(),
            "float" | "Float" => value.parse::<f32>().is_ok(),
            "boolean" | "Boolean" => value.parse::<bool>().is_ok(),
            "char" | "Character" => value.chars().count() == 1,
            "String" => true,
            _ => false,
        }
    }
}

/// Hot-parameter flow control rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamFlowRuleEntity {
    #[serde(flatten)]
    pub meta: RuleMeta,

    #[serde(default)]
    pub resource: Option<String>,

    #[serde(default)]
    pub limit_app: Option<String>,

    #[serde(default)]
    pub grade: Option<i32>,

    /// Index of the hot parameter in the resource call
    #[serde(default)]
    pub param_idx: Option<i32>,

    #[serde(default)]
    pub count: Option<f64>,

    #[serde(default)]
    pub duration_in_sec: Option<i64>,

    #[serde(default)]
    pub control_behavior: Option<i32>,

    #[serde(default)]
    pub max_queueing_time_ms: Option<i32>,

    #[serde(default)]
    pub burst_count: Option<i32>,

    #[serde(default)]
    pub param_flow_item_list: Vec<ParamFlowItem>,

    #[serde(default)]
    pub cluster_mode: bool,

    #[serde(default)]
    pub cluster_config: Option<ClusterFlowConfig>,
}

impl ParamFlowRuleEntity {
    fn normalize(&mut self) {
        trim_in_place(&mut self.resource);
        trim_in_place(&mut self.limit_app);
        self.grade.get_or_insert(FLOW_GRADE_QPS);
        self.control_behavior.get_or_insert(CONTROL_BEHAVIOR_DEFAULT);
        self.burst_count.get_or_insert(0);
    }
}

impl RuleEntity for ParamFlowRuleEntity {
    const KIND: RuleKind = RuleKind::ParamFlow;

    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RuleMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text(self.resource.as_deref(), "resource")?;
        require_text(self.limit_app.as_deref(), "limitApp")?;

        if let Some(grade) = self.grade {
            if grade != FLOW_GRADE_THREAD && grade != FLOW_GRADE_QPS {
                return Err(ValidationError(format!(
                    "grade must be 0 or 1, but {grade} got"
                )));
            }
        }
        if !matches!(self.param_idx, Some(idx) if idx >= 0) {
            return Err(ValidationError::new("paramIdx should be valid"));
        }
        if !matches!(self.count, Some(c) if c >= 0.0) {
            return Err(ValidationError::new("count should be valid"));
        }
        if !matches!(self.duration_in_sec, Some(d) if d > 0) {
            return Err(ValidationError::new("durationInSec should be valid"));
        }
        if let Some(behavior) = self.control_behavior {
            if behavior != CONTROL_BEHAVIOR_DEFAULT && behavior != CONTROL_BEHAVIOR_RATE_LIMITER {
                return Err(ValidationError::new("controlBehavior must be 0 or 2"));
            }
        }
        if matches!(self.burst_count, Some(b) if b < 0)
            || matches!(self.max_queueing_time_ms, Some(m) if m < 0)
        {
            return Err(ValidationError::new(
                "burstCount and maxQueueingTimeMs can't be negative",
            ));
        }
        if let Some(item) = self.param_flow_item_list.iter().find(|i| !i.is_valid()) {
            return Err(ValidationError(format!(
                "invalid param flow item: {}",
                item.object
            )));
        }
        if self.cluster_mode {
            match &self.cluster_config {
                Some(config) => config.check()?,
                None => return Err(ValidationError::new("cluster config should be valid")),
            }
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
