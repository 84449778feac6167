pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
pub mod domain;
pub mod observability;
pub mod storage;

pub use config::Config;
pub use controller::{ControllerError, RuleController};
pub use domain::{
    AuthorityRuleEntity, DegradeRuleEntity, FlowRuleEntity, ParamFlowRuleEntity, RuleEntity,
    RuleKind, SystemRuleEntity,
};
