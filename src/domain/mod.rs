pub mod authority;
pub mod degrade;
pub mod entity;
pub mod flow;
pub mod meta;
pub mod param_flow;
pub mod system;

pub use authority::AuthorityRuleEntity;
pub use degrade::DegradeRuleEntity;
pub use entity::{RuleEntity, RuleKind, ValidationError};
pub use flow::{ClusterFlowConfig, FlowRuleEntity};
pub use meta::{now_millis, RuleMeta};
pub use param_flow::{ParamFlowItem, ParamFlowRuleEntity};
pub use system::SystemRuleEntity;
