use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::domain::RuleKind;

/// Controller operation, used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOp {
    List = 0,
    Create = 1,
    Update = 2,
    Delete = 3,
}

impl RuleOp {
    const ALL: [RuleOp; 4] = [RuleOp::List, RuleOp::Create, RuleOp::Update, RuleOp::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOp::List => "list",
            RuleOp::Create => "create",
            RuleOp::Update => "update",
            RuleOp::Delete => "delete",
        }
    }
}

/// Why an operation failed, used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Validation = 0,
    NotFound = 1,
    Auth = 2,
    Collaborator = 3,
}

impl FailureClass {
    const ALL: [FailureClass; 4] = [
        FailureClass::Validation,
        FailureClass::NotFound,
        FailureClass::Auth,
        FailureClass::Collaborator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Validation => "validation",
            FailureClass::NotFound => "not_found",
            FailureClass::Auth => "auth",
            FailureClass::Collaborator => "collaborator",
        }
    }
}

fn kind_index(kind: RuleKind) -> usize {
    match kind {
        RuleKind::Flow => 0,
        RuleKind::Degrade => 1,
        RuleKind::System => 2,
        RuleKind::Authority => 3,
        RuleKind::ParamFlow => 4,
    }
}

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Operations started, by op
    pub operations: [AtomicU64; 4],

    /// Failed operations, by failure class
    pub failures: [AtomicU64; 4],

    /// Publishes attempted and failed, by rule kind
    pub publishes: [AtomicU64; 5],
    pub publish_errors: [AtomicU64; 5],

    /// Operation latency buckets
    pub latency_under_1ms: AtomicU64,
    pub latency_1_5ms: AtomicU64,
    pub latency_5_10ms: AtomicU64,
    pub latency_10_50ms: AtomicU64,
    pub latency_50_100ms: AtomicU64,
    pub latency_over_100ms: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record a controller operation.
    pub fn record_operation(&self, op: RuleOp) {
        self.operations[op as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed operation.
    pub fn record_failure(&self, class: FailureClass) {
        self.failures[class as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a publish attempt.
    pub fn record_publish(&self, kind: RuleKind, success: bool) {
        let idx = kind_index(kind);
        self.publishes[idx].fetch_add(1, Ordering::Relaxed);
        if !success {
            self.publish_errors[idx].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record operation latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;

        if micros < 1000 {
            self.latency_under_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 5000 {
            self.latency_1_5ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 10000 {
            self.latency_5_10ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 50000 {
            self.latency_10_50ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 100000 {
            self.latency_50_100ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_100ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn operation_count(&self, op: RuleOp) -> u64 {
        self.operations[op as usize].load(Ordering::Relaxed)
    }

    pub fn failure_count(&self, class: FailureClass) -> u64 {
        self.failures[class as usize].load(Ordering::Relaxed)
    }

    pub fn publish_error_count(&self, kind: RuleKind) -> u64 {
        self.publish_errors[kind_index(kind)].load(Ordering::Relaxed)
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP ruledash_operations_total Rule operations by type\n");
        out.push_str("# TYPE ruledash_operations_total counter\n");
        for op in RuleOp::ALL {
            let _ = writeln!(
                out,
                "ruledash_operations_total{{op=\"{}\"}} {}",
                op.as_str(),
                self.operation_count(op)
            );
        }

        out.push_str("\n# HELP ruledash_failures_total Failed rule operations by cause\n");
        out.push_str("# TYPE ruledash_failures_total counter\n");
        for class in FailureClass::ALL {
            let _ = writeln!(
                out,
                "ruledash_failures_total{{class=\"{}\"}} {}",
                class.as_str(),
                self.failure_count(class)
            );
        }

        out.push_str("\n# HELP ruledash_publishes_total Rule set publishes by kind\n");
        out.push_str("# TYPE ruledash_publishes_total counter\n");
        for kind in RuleKind::ALL {
            let _ = writeln!(
                out,
                "ruledash_publishes_total{{kind=\"{}\"}} {}",
                kind,
                self.publishes[kind_index(kind)].load(Ordering::Relaxed)
            );
        }

        out.push_str("\n# HELP ruledash_publish_errors_total Failed publishes by kind\n");
        out.push_str("# TYPE ruledash_publish_errors_total counter\n");
        for kind in RuleKind::ALL {
            let _ = writeln!(
                out,
                "ruledash_publish_errors_total{{kind=\"{}\"}} {}",
                kind,
                self.publish_error_count(kind)
            );
        }

        let _ = write!(
            out,
            r#"
# HELP ruledash_operation_latency_bucket Operation latency histogram
# TYPE ruledash_operation_latency_bucket counter
ruledash_operation_latency_bucket{{le="0.001"}} {}
ruledash_operation_latency_bucket{{le="0.005"}} {}
ruledash_operation_latency_bucket{{le="0.01"}} {}
ruledash_operation_latency_bucket{{le="0.05"}} {}
ruledash_operation_latency_bucket{{le="0.1"}} {}
ruledash_operation_latency_bucket{{le="+Inf"}} {}
"#,
            self.latency_under_1ms.load(Ordering::Relaxed),
            self.latency_1_5ms.load(Ordering::Relaxed),
            self.latency_5_10ms.load(Ordering::Relaxed),
            self.latency_10_50ms.load(Ordering::Relaxed),
            self.latency_50_100ms.load(Ordering::Relaxed),
            self.latency_over_100ms.load(Ordering::Relaxed),
        );

        out
    }
}

/// Guard for timing operations.
pub struct TimingGuard<'a> {
    registry: &'a MetricsRegistry,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(registry: &'a MetricsRegistry) -> Self {
        TimingGuard {
            registry,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimingGuard<'a> {
    fn drop(&mut self) {
        self.registry.record_latency(self.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operations_and_failures() {
        let metrics = MetricsRegistry::new();

        metrics.record_operation(RuleOp::Create);
        metrics.record_operation(RuleOp::Create);
        metrics.record_operation(RuleOp::Delete);
        metrics.record_failure(FailureClass::Validation);

        assert_eq!(metrics.operation_count(RuleOp::Create), 2);
        assert_eq!(metrics.operation_count(RuleOp::Delete), 1);
        assert_eq!(metrics.failure_count(FailureClass::Validation), 1);
        assert_eq!(metrics.failure_count(FailureClass::Auth), 0);
    }

    #[test]
    fn test_record_publish() {
        let metrics = MetricsRegistry::new();

        metrics.record_publish(RuleKind::Flow, true);
        metrics.record_publish(RuleKind::Flow, false);

        assert_eq!(metrics.publish_error_count(RuleKind::Flow), 1);
        assert_eq!(metrics.publish_error_count(RuleKind::System), 0);
    }

    #[test]
    fn test_timing_guard_records_latency() {
        let metrics = MetricsRegistry::new();
        {
            let _guard = TimingGuard::new(&metrics);
        }

        let total = metrics.latency_under_1ms.load(Ordering::Relaxed)
            + metrics.latency_1_5ms.load(Ordering::Relaxed)
            + metrics.latency_5_10ms.load(Ordering::Relaxed)
            + metrics.latency_10_50ms.load(Ordering::Relaxed)
            + metrics.latency_50_100ms.load(Ordering::Relaxed)
            + metrics.latency_over_100ms.load(Ordering::Relaxed);
        assert_eq!(total, 1);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = MetricsRegistry::new();
        metrics.record_operation(RuleOp::List);
        metrics.record_publish(RuleKind::ParamFlow, false);

        let output = metrics.to_prometheus();

        assert!(output.contains("ruledash_operations_total{op=\"list\"} 1"));
        assert!(output.contains("ruledash_publish_errors_total{kind=\"param-flow\"} 1"));
        assert!(output.contains("ruledash_operation_latency_bucket{le=\"+Inf\"} 0"));
    }
}
