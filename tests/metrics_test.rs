//! Tests for metrics.rs and logging.rs helpers

use std::time::Duration;

use supportal_store::logging::OperationTimer;
use supportal_store::metrics::{MetricsCollector, MetricsTimer};

#[test]
fn test_metric_names_are_prefixed() {
    let collector = MetricsCollector::default();
    for name in [
        collector.db_operations_total,
        collector.db_operation_duration,
        collector.db_connection_pool_size,
        collector.constraint_violations_total,
        collector.migrations_applied_total,
        collector.migrations_reverted_total,
        collector.errors_total,
    ] {
        assert!(name.starts_with("supportal_"), "{name}");
    }
}

#[test]
fn test_recording_is_safe_without_recorder() {
    let collector = MetricsCollector::default();
    collector.record_db_operation("get_chunks", Duration::from_micros(250), true);
    collector.record_db_operation("add_vector_chunk", Duration::from_micros(900), false);
    collector.record_constraint_violation("add_vector_chunk");
    collector.record_error("stats");
    collector.record_migration("auth.0001_users", false);
    collector.update_connection_pool_size(1);
}

#[test]
fn test_metrics_timer() {
    let timer = MetricsTimer::new(MetricsCollector::default(), "list_documents");
    let elapsed = timer.finish(true);
    assert!(elapsed < Duration::from_secs(5));
}

#[test]
fn test_operation_timer() {
    let timer = OperationTimer::new("export");
    std::thread::sleep(Duration::from_millis(5));
    assert!(timer.finish() >= 5);
}
