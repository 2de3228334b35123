// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the route controller.
//!
//! Every metric carries the namespace prefix `routeplane_firestoned_io_`
//! (prometheus-safe version of "routeplane.firestoned.io").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Route passes, their outcomes and duration
//! - **Traffic Metrics** - Passes that stopped on an unresolved traffic target
//! - **Child Metrics** - Writes to certificates, ingresses and placeholder services
//! - **Error Metrics** - Failed passes by error category
//!
//! # Example
//!
//! ```rust,no_run
//! use routeplane::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("Route", std::time::Duration::from_secs(1));
//! ```

use prometheus::core::Collector;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all routeplane metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "routeplane_firestoned_io";

/// Child write operations, used as the `operation` label.
pub const OPERATION_CREATED: &str = "created";
pub const OPERATION_UPDATED: &str = "updated";
pub const OPERATION_DELETED: &str = "deleted";

/// Global Prometheus metrics registry, served on `/metrics`.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn registered<C: Collector + Clone + 'static>(collector: C) -> C {
    METRICS_REGISTRY
        .register(Box::new(collector.clone()))
        .unwrap();
    collector
}

fn counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    registered(CounterVec::new(opts, labels).unwrap())
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Reconcile passes by outcome.
///
/// Labels:
/// - `resource_type`: Kind reconciled (`Route`)
/// - `status`: `success`, `error` or `requeue`
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "reconciliations_total",
        "Total number of reconcile passes by resource type and outcome",
        &["resource_type", "status"],
    )
});

/// Reconcile pass duration in seconds.
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconcile passes in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    registered(HistogramVec::new(opts, &["resource_type"]).unwrap())
});

/// Requeues scheduled by the error policy.
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "requeues_total",
        "Total number of requeues by resource type and reason",
        &["resource_type", "reason"],
    )
});

// ============================================================================
// Traffic Metrics
// ============================================================================

/// Passes that ended on a traffic target which is missing or not ready.
///
/// Labels:
/// - `reason`: The `AllTrafficAssigned` reason, e.g. `RevisionMissing`
pub static TARGET_ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "traffic_target_errors_total",
        "Total number of passes that stopped on an unresolved traffic target",
        &["reason"],
    )
});

// ============================================================================
// Child Metrics
// ============================================================================

/// Writes issued against children of a route.
///
/// Labels:
/// - `kind`: `EdgeIngress`, `Certificate` or `Service`
/// - `operation`: `created`, `updated` or `deleted`
pub static CHILD_WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "child_writes_total",
        "Total number of child resource writes by kind and operation",
        &["kind", "operation"],
    )
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Failed passes by category: `conflict`, `not_owned`, `invalid_traffic` or `api_error`.
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "errors_total",
        "Total number of errors by resource type and error category",
        &["resource_type", "error_type"],
    )
});

// ============================================================================
// Helper Functions
// ============================================================================

fn observe_pass(resource_type: &str, status: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, status])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a reconcile pass that returned `Ok`, soft traffic errors included.
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    observe_pass(resource_type, "success", duration);
}

/// Record a reconcile pass that returned an error.
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    observe_pass(resource_type, "error", duration);
}

/// Record a requeue scheduled by the error policy.
pub fn record_reconciliation_requeue(resource_type: &str, reason: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "requeue"])
        .inc();
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, reason])
        .inc();
}

/// Record a pass that stopped on an unresolved traffic target.
pub fn record_target_error(reason: &str) {
    TARGET_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a write against a child of a route.
///
/// # Arguments
/// * `kind` - Kind of the child, e.g. `Certificate`
/// * `operation` - One of [`OPERATION_CREATED`], [`OPERATION_UPDATED`], [`OPERATION_DELETED`]
pub fn record_child_write(kind: &str, operation: &str) {
    CHILD_WRITES_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
}

/// Record a failed pass by error category.
pub fn record_error(resource_type: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[resource_type, error_type])
        .inc();
}

/// Encode every registered metric in the Prometheus text format.
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_error_share_the_duration_histogram() {
        let resource_type = "MetricsRoute";
        let before = RECONCILIATION_DURATION_SECONDS
            .with_label_values(&[resource_type])
            .get_sample_count();

        record_reconciliation_success(resource_type, Duration::from_millis(500));
        record_reconciliation_error(resource_type, Duration::from_millis(250));

        assert!(
            RECONCILIATION_TOTAL
                .with_label_values(&[resource_type, "success"])
                .get()
                >= 1.0
        );
        assert!(
            RECONCILIATION_TOTAL
                .with_label_values(&[resource_type, "error"])
                .get()
                >= 1.0
        );
        let after = RECONCILIATION_DURATION_SECONDS
            .with_label_values(&[resource_type])
            .get_sample_count();
        assert!(after >= before + 2);
    }

    #[test]
    fn test_requeue_counts_reason() {
        record_reconciliation_requeue("RequeueRoute", "error");
        assert!(
            REQUEUE_TOTAL
                .with_label_values(&["RequeueRoute", "error"])
                .get()
                >= 1.0
        );
        assert!(
            RECONCILIATION_TOTAL
                .with_label_values(&["RequeueRoute", "requeue"])
                .get()
                >= 1.0
        );
    }

    #[test]
    fn test_child_writes_and_target_errors() {
        record_child_write("TestChild", OPERATION_CREATED);
        record_child_write("TestChild", OPERATION_DELETED);
        record_target_error("TestReason");
        record_error("TestChild", "not_owned");

        for operation in [OPERATION_CREATED, OPERATION_DELETED] {
            assert!(
                CHILD_WRITES_TOTAL
                    .with_label_values(&["TestChild", operation])
                    .get()
                    >= 1.0
            );
        }
        assert!(TARGET_ERRORS_TOTAL.with_label_values(&["TestReason"]).get() >= 1.0);
        assert!(
            ERRORS_TOTAL
                .with_label_values(&["TestChild", "not_owned"])
                .get()
                >= 1.0
        );
    }

    #[test]
    fn test_gather_metrics() {
        record_reconciliation_success("GatherTest", Duration::from_millis(100));
        record_child_write("GatherChild", OPERATION_UPDATED);

        let metrics_text = gather_metrics().unwrap();
        assert!(metrics_text.contains("routeplane_firestoned_io_reconciliations_total"));
        assert!(metrics_text.contains("routeplane_firestoned_io_child_writes_total"));
    }
}
