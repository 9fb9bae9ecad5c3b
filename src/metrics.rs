use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Metric names recorded by the store.
///
/// Recording goes through the `metrics` facade; with no recorder installed
/// every call is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCollector {
    /// Counter of store operations, labelled by operation and status
    pub db_operations_total: &'static str,
    /// Histogram of store operation latency in seconds
    pub db_operation_duration: &'static str,
    /// Gauge of the configured connection pool size
    pub db_connection_pool_size: &'static str,
    /// Counter of rejected writes, labelled by operation
    pub constraint_violations_total: &'static str,
    /// Counter of migrations applied, labelled by migration
    pub migrations_applied_total: &'static str,
    /// Counter of migrations reverted, labelled by migration
    pub migrations_reverted_total: &'static str,
    /// Counter of non-constraint failures, labelled by operation
    pub errors_total: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            db_operations_total: "supportal_db_operations_total",
            db_operation_duration: "supportal_db_operation_duration_seconds",
            db_connection_pool_size: "supportal_db_connection_pool_size",
            constraint_violations_total: "supportal_constraint_violations_total",
            migrations_applied_total: "supportal_migrations_applied_total",
            migrations_reverted_total: "supportal_migrations_reverted_total",
            errors_total: "supportal_errors_total",
        }
    }
}

impl MetricsCollector {
    /// Record database operation metrics
    pub fn record_db_operation(&self, operation: &str, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };

        counter!(
            self.db_operations_total,
            "operation" => operation.to_string(),
            "status" => status
        )
        .increment(1);
        histogram!(self.db_operation_duration, "operation" => operation.to_string())
            .record(duration.as_secs_f64());
    }

    /// Record a write rejected by a data constraint
    pub fn record_constraint_violation(&self, operation: &str) {
        counter!(self.constraint_violations_total, "operation" => operation.to_string())
            .increment(1);
    }

    /// Record a failure that is not a constraint violation
    pub fn record_error(&self, operation: &str) {
        counter!(self.errors_total, "operation" => operation.to_string()).increment(1);
    }

    /// Record a migration being applied or reverted
    pub fn record_migration(&self, migration: &str, applied: bool) {
        let name = if applied {
            self.migrations_applied_total
        } else {
            self.migrations_reverted_total
        };
        counter!(name, "migration" => migration.to_string()).increment(1);
    }

    /// Update connection pool size
    pub fn update_connection_pool_size(&self, size: u32) {
        gauge!(self.db_connection_pool_size).set(f64::from(size));
    }
}

/// Times a single store operation; [`MetricsTimer::finish`] records it
#[derive(Debug)]
pub struct MetricsTimer {
    collector: MetricsCollector,
    operation: &'static str,
    start: Instant,
}

impl MetricsTimer {
    /// Start timing `operation`
    #[must_use]
    pub fn new(collector: MetricsCollector, operation: &'static str) -> Self {
        Self {
            collector,
            operation,
            start: Instant::now(),
        }
    }

    /// Stop timing and record the outcome, returning the elapsed time
    pub fn finish(self, success: bool) -> Duration {
        let duration = self.start.elapsed();
        self.collector
            .record_db_operation(self.operation, duration, success);
        duration
    }
}
