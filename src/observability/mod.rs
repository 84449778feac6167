pub mod metrics;
pub mod tracing;

pub use metrics::{FailureClass, MetricsRegistry, RuleOp, TimingGuard};
pub use tracing::init_tracing;
