//! # Tracker Metrics
//!
//! OpenTelemetry instruments for submission and reconciliation. Instruments
//! come from the global meter provider, which is a no-op until the host
//! process installs an exporter.
//!
//! ## Usage
//!
//! ```rust
//! use lifecycle_tracker::metrics;
//! use opentelemetry::KeyValue;
//!
//! metrics::terminal_transitions_total().add(1, &[KeyValue::new("status", "completed")]);
//! metrics::pending_records().record(42, &[]);
//! ```

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::OnceLock;

static TRACKER_METER: OnceLock<Meter> = OnceLock::new();

static SUBMISSIONS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static SUBMISSION_REJECTIONS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static TERMINAL_TRANSITIONS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static STATUS_CHECK_FAILURES_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static RECORD_ERRORS_TOTAL: OnceLock<Counter<u64>> = OnceLock::new();
static PENDING_RECORDS: OnceLock<Gauge<u64>> = OnceLock::new();
static PENDING_AGE_SECONDS: OnceLock<Histogram<f64>> = OnceLock::new();
static CYCLE_DURATION: OnceLock<Histogram<f64>> = OnceLock::new();

fn meter() -> &'static Meter {
    TRACKER_METER.get_or_init(|| opentelemetry::global::meter_provider().meter("lifecycle-tracker"))
}

// Counters

/// Work items accepted by the processor and tracked
pub fn submissions_total() -> &'static Counter<u64> {
    SUBMISSIONS_TOTAL.get_or_init(|| {
        meter()
            .u64_counter("tracker.submissions.total")
            .with_description("Work items accepted by the processor and tracked")
            .build()
    })
}

/// Submissions that did not produce a tracking record
///
/// Labels:
/// - reason: rejected, missing_key, transport, content, tracking
pub fn submission_rejections_total() -> &'static Counter<u64> {
    SUBMISSION_REJECTIONS_TOTAL.get_or_init(|| {
        meter()
            .u64_counter("tracker.submissions.rejections.total")
            .with_description("Submissions that did not produce a tracking record")
            .build()
    })
}

/// Labels:
/// - status: completed, failed, timed_out
pub fn terminal_transitions_total() -> &'static Counter<u64> {
    TERMINAL_TRANSITIONS_TOTAL.get_or_init(|| {
        meter()
            .u64_counter("tracker.transitions.terminal.total")
            .with_description("Records that reached a terminal status")
            .build()
    })
}

/// Status queries that failed or timed out
pub fn status_check_failures_total() -> &'static Counter<u64> {
    STATUS_CHECK_FAILURES_TOTAL.get_or_init(|| {
        meter()
            .u64_counter("tracker.status_checks.failures.total")
            .with_description("Status queries that failed or timed out")
            .build()
    })
}

/// Per-record reconciliation errors (store or publish faults)
///
/// Labels:
/// - stage: persist, dispatch, delete, decode
pub fn record_errors_total() -> &'static Counter<u64> {
    RECORD_ERRORS_TOTAL.get_or_init(|| {
        meter()
            .u64_counter("tracker.reconciliation.errors.total")
            .with_description("Per-record reconciliation errors")
            .build()
    })
}

// Gauges and histograms

/// Active records waiting on the processor
pub fn pending_records() -> &'static Gauge<u64> {
    PENDING_RECORDS.get_or_init(|| {
        meter()
            .u64_gauge("tracker.pending.records")
            .with_description("Active records waiting on the processor")
            .build()
    })
}

/// Age of pending records at scan time
pub fn pending_age_seconds() -> &'static Histogram<f64> {
    PENDING_AGE_SECONDS.get_or_init(|| {
        meter()
            .f64_histogram("tracker.pending.age")
            .with_description("Age of pending records at scan time")
            .with_unit("s")
            .build()
    })
}

/// Wall time of one reconciliation cycle
pub fn cycle_duration() -> &'static Histogram<f64> {
    CYCLE_DURATION.get_or_init(|| {
        meter()
            .f64_histogram("tracker.cycle.duration")
            .with_description("Reconciliation cycle duration in milliseconds")
            .with_unit("ms")
            .build()
    })
}

/// Create every instrument up front
pub fn init() {
    submissions_total();
    submission_rejections_total();
    terminal_transitions_total();
    status_check_failures_total();
    record_errors_total();
    pending_records();
    pending_age_seconds();
    cycle_duration();
}
