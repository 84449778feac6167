use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{require_text, RuleEntity, RuleKind, ValidationError};
use super::meta::{is_blank, trim_in_place, RuleMeta};

/// Flow grade: concurrent thread count.
pub const FLOW_GRADE_THREAD: i32 = 0;
/// Flow grade: queries per second.
pub const FLOW_GRADE_QPS: i32 = 1;

/// Strategy: limit on the resource itself.
pub const STRATEGY_DIRECT: i32 = 0;
/// Strategy: limit when a related resource is busy.
pub const STRATEGY_RELATE: i32 = 1;
/// Strategy: limit only calls entering through a given chain entry.
pub const STRATEGY_CHAIN: i32 = 2;

pub const CONTROL_BEHAVIOR_DEFAULT: i32 = 0;
pub const CONTROL_BEHAVIOR_WARM_UP: i32 = 1;
pub const CONTROL_BEHAVIOR_RATE_LIMITER: i32 = 2;
pub const CONTROL_BEHAVIOR_WARM_UP_RATE_LIMITER: i32 = 3;

/// Cluster threshold shared as an average per client.
pub const CLUSTER_THRESHOLD_AVG_LOCAL: i32 = 0;
/// Cluster threshold applied globally.
pub const CLUSTER_THRESHOLD_GLOBAL: i32 = 1;

/// Cluster-mode settings for flow and parameter-flow rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterFlowConfig {
    #[serde(default)]
    pub flow_id: Option<i64>,

    #[serde(default)]
    pub threshold_type: i32,

    #[serde(default = "default_true")]
    pub fallback_to_local_when_fail: bool,

    #[serde(default)]
    pub sample_count: Option<i32>,

    #[serde(default)]
    pub window_interval_ms: Option<i32>,
}

fn default_true() -> bool {
    true
}

impl ClusterFlowConfig {
    pub(crate) fn check(&self) -> Result<(), ValidationError> {
        if self.threshold_type != CLUSTER_THRESHOLD_AVG_LOCAL
            && self.threshold_type != CLUSTER_THRESHOLD_GLOBAL
        {
            return Err(ValidationError::new(
                "cluster threshold type must be 0 or 1",
            ));
        }
        if matches!(self.sample_count, Some(n) if n <= 0)
            || matches!(self.window_interval_ms, Some(n) if n <= 0)
        {
            return Err(ValidationError::new("cluster config should be valid"));
        }
        Ok(())
    }
}

/// Flow control rule: caps QPS or concurrency on a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRuleEntity {
    #[serde(flatten)]
    pub meta: RuleMeta,

    #[serde(default)]
    pub resource: Option<String>,

    #[serde(default)]
    pub limit_app: Option<String>,

    #[serde(default)]
    pub grade: Option<i32>,

    #[serde(default)]
    pub count: Option<f64>,

    #[serde(default)]
    pub strategy: Option<i32>,

    #[serde(default)]
    pub ref_resource: Option<String>,

    #[serde(default)]
    pub control_behavior: Option<i32>,

    #[serde(default)]
    pub warm_up_period_sec: Option<i32>,

    #[serde(default)]
    pub max_queueing_time_ms: Option<i32>,

    #[serde(default)]
    pub cluster_mode: bool,

    #[serde(default)]
    pub cluster_config: Option<ClusterFlowConfig>,
}

impl FlowRuleEntity {
    /// Direct QPS limit with the default reject behavior.
    pub fn qps(app: &str, resource: &str, count: f64) -> Self {
        FlowRuleEntity {
            meta: RuleMeta::for_app(app),
            resource: Some(resource.to_string()),
            limit_app: Some("default".to_string()),
            grade: Some(FLOW_GRADE_QPS),
            count: Some(count),
            strategy: Some(STRATEGY_DIRECT),
            control_behavior: Some(CONTROL_BEHAVIOR_DEFAULT),
            ..Default::default()
        }
    }

    fn trim(&mut self) {
        trim_in_place(&mut self.resource);
        trim_in_place(&mut self.limit_app);
        trim_in_place(&mut self.ref_resource);
    }
}

impl RuleEntity for FlowRuleEntity {
    const KIND: RuleKind = RuleKind::Flow;

    fn meta(&self) -> &RuleMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RuleMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text(self.limit_app.as_deref(), "limitApp")?;
        require_text(self.resource.as_deref(), "resource")?;

        let grade = self
            .grade
            .ok_or_else(|| ValidationError::new("grade can't be null"))?;
        if grade != FLOW_GRADE_THREAD && grade != FLOW_GRADE_QPS {
            return Err(ValidationError(format!(
                "grade must be 0 or 1, but {grade} got"
            )));
        }

        match self.count {
            Some(count) if count >= 0.0 => {}
            _ => return Err(ValidationError::new("count should be at least zero")),
        }

        let strategy = self
            .strategy
            .ok_or_else(|| ValidationError::new("strategy can't be null"))?;
        if !(STRATEGY_DIRECT..=STRATEGY_CHAIN).contains(&strategy) {
            return Err(ValidationError(format!(
                "strategy must be in [0, 1, 2], but {strategy} got"
            )));
        }
        if strategy != STRATEGY_DIRECT && is_blank(self.ref_resource.as_deref()) {
            return Err(ValidationError::new(
                "refResource can't be null or empty when strategy!=0",
            ));
        }

        let behavior = self
            .control_behavior
            .ok_or_else(|| ValidationError::new("controlBehavior can't be null"))?;
        if !(CONTROL_BEHAVIOR_DEFAULT..=CONTROL_BEHAVIOR_WARM_UP_RATE_LIMITER).contains(&behavior) {
            return Err(ValidationError(format!(
                "controlBehavior must be in [0, 1, 2, 3], but {behavior} got"
            )));
        }
        let warm_up = matches!(
            behavior,
            CONTROL_BEHAVIOR_WARM_UP | CONTROL_BEHAVIOR_WARM_UP_RATE_LIMITER
        );
        if warm_up && self.warm_up_period_sec.is_none() {
            return Err(ValidationError::new(
                "warmUpPeriodSec can't be null when controlBehavior==1",
            ));
        }
        let queueing = matches!(
            behavior,
            CONTROL_BEHAVIOR_RATE_LIMITER | CONTROL_BEHAVIOR_WARM_UP_RATE_LIMITER
        );
        if queueing && self.max_queueing_time_ms.is_none() {
            return Err(ValidationError::new(
                "maxQueueingTimeMs can't be null when controlBehavior==2",
            ));
        }
        if matches!(self.warm_up_period_sec, Some(n) if n < 0)
            || matches!(self.max_queueing_time_ms, Some(n) if n < 0)
        {
            return Err(ValidationError::new(
                "warmUpPeriodSec and maxQueueingTimeMs can't be negative",
            ));
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
        self.trim();
    }

    fn pre_update(&mut self, id: i64, old: &Self, now: DateTime<Utc>) {
        self.meta.stamp_updated(id, &old.meta, now);
        self.trim();
    }
}
