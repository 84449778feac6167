pub mod error;
pub mod rule;

pub use error::ControllerError;
pub use rule::RuleController;
