//! Reconciliation cycles driven by a manual clock and a scripted processor.

mod common;

use chrono::Duration;
use common::*;
use lifecycle_tracker::config::NotificationConfig;
use lifecycle_tracker::models::ProcessingResult;
use lifecycle_tracker::state_machine::{TrackingStatus, CHECK_LIMIT_REASON};
use lifecycle_tracker::store::TrackingStore;
use lifecycle_tracker::TrackingRecord;

async fn seed(harness: &TestHarness, record: &TrackingRecord) {
    harness.store.upsert(record).await.unwrap();
}

async fn stored(harness: &TestHarness, request_id: &str) -> Option<TrackingRecord> {
    harness.store.get(request_id).await.unwrap().into_option()
}

#[tokio::test]
async fn test_processing_then_completed_notifies_once_and_deletes() {
    let harness = TestHarness::new();
    let record = processing_record("req-a", t0());
    seed(&harness, &record).await;

    let first = harness.poller.run_cycle().await.unwrap();
    assert_eq!(first.examined, 1);
    assert_eq!(first.still_processing, 1);
    let after_first = stored(&harness, "req-a").await.unwrap();
    assert_eq!(after_first.status, TrackingStatus::Processing);
    assert_eq!(after_first.check_count, 1);
    assert_eq!(after_first.last_checked_at, Some(t0()));
    assert!(harness.bus.published().is_empty());

    harness.advance(Duration::minutes(5));
    harness.processor.set_status(
        "job-req-a",
        ScriptedStatus::Report {
            status: "completed".to_string(),
            message: None,
            result: Some(ProcessingResult {
                display_name: Some("Weekly standup".to_string()),
                ..ProcessingResult::default()
            }),
        },
    );

    let second = harness.poller.run_cycle().await.unwrap();
    assert_eq!(second.completed, 1);
    assert_eq!(second.retired, 1);
    assert_eq!(stored(&harness, "req-a").await, None);

    let completed = harness.bus.events_of_type("completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].details["check_count"], 2);
    assert_eq!(completed[0].details["result"]["display_name"], "Weekly standup");
    assert_eq!(completed[0].message, "Request req-a completed: Weekly standup");
    assert_eq!(
        harness.bus.published()[0].0,
        NotificationConfig::default().status_topic
    );

    // nothing left to do
    let third = harness.poller.run_cycle().await.unwrap();
    assert_eq!(third.examined, 0);
    assert_eq!(harness.bus.published().len(), 1);
    assert_eq!(harness.processor.status_calls("job-req-a"), 2);
}

#[tokio::test]
async fn test_expired_record_times_out_without_processor_call() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-b", t0())).await;
    // even a terminal answer loses to expiry
    harness
        .processor
        .set_status("job-req-b", ScriptedStatus::report("completed"));

    harness.advance(Duration::hours(24) + Duration::seconds(1));
    let summary = harness.poller.run_cycle().await.unwrap();

    assert_eq!(summary.timed_out, 1);
    assert_eq!(summary.retired, 1);
    assert_eq!(harness.processor.total_status_calls(), 0);
    assert_eq!(stored(&harness, "req-b").await, None);

    let timed_out = harness.bus.events_of_type("timed_out");
    assert_eq!(timed_out.len(), 1);
    assert_eq!(timed_out[0].details["status"], "timed_out");
    assert_eq!(
        timed_out[0].details["status_reason"],
        "exceeded maximum age of 1440 minutes"
    );
}

#[tokio::test]
async fn test_record_at_exact_max_age_is_still_checked() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-edge", t0())).await;

    harness.advance(Duration::hours(24));
    let summary = harness.poller.run_cycle().await.unwrap();

    assert_eq!(summary.timed_out, 0);
    assert_eq!(summary.still_processing, 1);
    assert_eq!(harness.processor.status_calls("job-req-edge"), 1);
}

#[tokio::test]
async fn test_one_failing_record_does_not_block_the_batch() {
    let harness = TestHarness::new();
    for id in ["req-1", "req-2", "req-3"] {
        seed(&harness, &processing_record(id, t0())).await;
    }
    harness
        .processor
        .set_status("job-req-1", ScriptedStatus::report("success"));
    harness
        .processor
        .set_status("job-req-2", ScriptedStatus::Error("connection reset".to_string()));
    harness
        .processor
        .set_status("job-req-3", ScriptedStatus::report("running"));

    let summary = harness.poller.run_cycle().await.unwrap();

    assert_eq!(summary.examined, 3);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.still_processing, 2);
    assert_eq!(summary.errors, 0);

    assert_eq!(stored(&harness, "req-1").await, None);
    let failing = stored(&harness, "req-2").await.unwrap();
    assert_eq!(failing.status, TrackingStatus::Processing);
    assert_eq!(failing.check_count, 1);
    assert!(failing
        .status_message
        .as_deref()
        .unwrap()
        .starts_with("status check failed"));
    let running = stored(&harness, "req-3").await.unwrap();
    assert_eq!(running.check_count, 1);
    assert_eq!(running.last_external_status.as_deref(), Some("running"));
}

#[tokio::test]
async fn test_check_limit_forces_failure() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-slow", t0())).await;

    for expected in 1..5 {
        let summary = harness.poller.run_cycle().await.unwrap();
        assert_eq!(summary.still_processing, 1);
        let record = stored(&harness, "req-slow").await.unwrap();
        assert_eq!(record.check_count, expected);
        harness.advance(Duration::minutes(5));
    }

    let summary = harness.poller.run_cycle().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.retired, 1);
    assert_eq!(stored(&harness, "req-slow").await, None);

    let failed = harness.bus.events_of_type("failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].details["status_reason"], CHECK_LIMIT_REASON);
    assert_eq!(failed[0].details["check_count"], 5);
}

#[tokio::test]
async fn test_external_failure_is_terminal() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-f", t0())).await;
    harness.processor.set_status(
        "job-req-f",
        ScriptedStatus::Report {
            status: "FAILED".to_string(),
            message: Some("corrupt audio".to_string()),
            result: None,
        },
    );

    let summary = harness.poller.run_cycle().await.unwrap();

    assert_eq!(summary.failed, 1);
    let failed = harness.bus.events_of_type("failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].details["status_reason"], "corrupt audio");
    assert_eq!(failed[0].details["external_status"], "FAILED");
}

#[tokio::test]
async fn test_unrecognized_status_keeps_processing() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-odd", t0())).await;
    harness
        .processor
        .set_status("job-req-odd", ScriptedStatus::report("transcoding-phase-2"));

    let summary = harness.poller.run_cycle().await.unwrap();

    assert_eq!(summary.still_processing, 1);
    let record = stored(&harness, "req-odd").await.unwrap();
    assert_eq!(record.status, TrackingStatus::Processing);
    assert_eq!(
        record.last_external_status.as_deref(),
        Some("transcoding-phase-2")
    );
    assert_eq!(
        record.status_message.as_deref(),
        Some("unrecognized processor status 'transcoding-phase-2'")
    );
}

#[tokio::test]
async fn test_hung_status_call_counts_as_failed_check() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-hang", t0())).await;
    harness.processor.set_status("job-req-hang", ScriptedStatus::Hang);

    let summary = harness.poller.run_cycle().await.unwrap();

    assert_eq!(summary.still_processing, 1);
    let record = stored(&harness, "req-hang").await.unwrap();
    assert_eq!(record.check_count, 1);
    assert!(record.status_message.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_stranded_terminal_record_is_retired_without_processor_call() {
    let harness = TestHarness::new();
    let mut record = processing_record("req-stranded", t0());
    record.status = TrackingStatus::Completed;
    record.check_count = 3;
    seed(&harness, &record).await;

    let summary = harness.poller.run_cycle().await.unwrap();

    assert_eq!(summary.examined, 1);
    assert_eq!(summary.retired, 1);
    assert_eq!(summary.terminal(), 0);
    assert_eq!(harness.processor.total_status_calls(), 0);
    assert_eq!(harness.bus.events_of_type("completed").len(), 1);
    assert_eq!(stored(&harness, "req-stranded").await, None);
}

#[tokio::test]
async fn test_publish_failure_keeps_record_for_next_cycle() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-p", t0())).await;
    harness
        .processor
        .set_status("job-req-p", ScriptedStatus::report("completed"));
    harness.bus.set_failing(true);

    let first = harness.poller.run_cycle().await.unwrap();
    assert_eq!(first.completed, 1);
    assert_eq!(first.errors, 1);
    assert_eq!(first.retired, 0);
    let kept = stored(&harness, "req-p").await.unwrap();
    assert_eq!(kept.status, TrackingStatus::Completed);

    harness.bus.set_failing(false);
    let second = harness.poller.run_cycle().await.unwrap();
    assert_eq!(second.retired, 1);
    assert_eq!(second.errors, 0);
    assert_eq!(harness.bus.events_of_type("completed").len(), 1);
    assert_eq!(harness.processor.status_calls("job-req-p"), 1);
    assert_eq!(stored(&harness, "req-p").await, None);
}

#[tokio::test]
async fn test_renotified_completion_keeps_processing_result() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-r", t0())).await;
    harness.processor.set_status(
        "job-req-r",
        ScriptedStatus::Report {
            status: "completed".to_string(),
            message: None,
            result: Some(ProcessingResult {
                display_name: Some("Quarterly review".to_string()),
                ..ProcessingResult::default()
            }),
        },
    );
    harness.bus.set_failing(true);

    let first = harness.poller.run_cycle().await.unwrap();
    assert_eq!(first.errors, 1);
    let kept = stored(&harness, "req-r").await.unwrap();
    assert_eq!(
        kept.result.and_then(|r| r.display_name).as_deref(),
        Some("Quarterly review")
    );

    harness.bus.set_failing(false);
    let second = harness.poller.run_cycle().await.unwrap();
    assert_eq!(second.retired, 1);
    assert_eq!(harness.processor.status_calls("job-req-r"), 1);

    let completed = harness.bus.events_of_type("completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].details["result"]["display_name"], "Quarterly review");
    assert_eq!(completed[0].message, "Request req-r completed: Quarterly review");
}

#[tokio::test]
async fn test_delete_failure_renotifies_next_cycle() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-d", t0())).await;
    harness
        .processor
        .set_status("job-req-d", ScriptedStatus::report("completed"));
    harness.store.set_fail_deletes(true);

    let first = harness.poller.run_cycle().await.unwrap();
    assert_eq!(first.errors, 1);
    assert_eq!(
        stored(&harness, "req-d").await.unwrap().status,
        TrackingStatus::Completed
    );

    harness.store.set_fail_deletes(false);
    let second = harness.poller.run_cycle().await.unwrap();
    assert_eq!(second.retired, 1);

    // at-least-once: the notification went out on both cycles
    assert_eq!(harness.bus.events_for("req-d").len(), 2);
    assert_eq!(stored(&harness, "req-d").await, None);
}

#[tokio::test]
async fn test_persist_failure_is_counted_and_isolated() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-ok", t0())).await;
    seed(&harness, &processing_record("req-stuck", t0())).await;
    harness.store.fail_upserts_for("req-stuck");

    let summary = harness.poller.run_cycle().await.unwrap();

    assert_eq!(summary.examined, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.still_processing, 1);
    assert_eq!(stored(&harness, "req-ok").await.unwrap().check_count, 1);
    assert_eq!(stored(&harness, "req-stuck").await.unwrap().check_count, 0);
}

#[tokio::test]
async fn test_shutdown_before_cycle_examines_nothing() {
    let harness = TestHarness::new();
    seed(&harness, &processing_record("req-s", t0())).await;

    harness.poller.request_shutdown();
    let summary = harness.poller.run_cycle().await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.examined, 0);
    assert_eq!(harness.processor.total_status_calls(), 0);
    assert_eq!(stored(&harness, "req-s").await.unwrap().check_count, 0);
}

#[tokio::test]
async fn test_batch_size_defers_and_rotates_records() {
    let mut config = test_poller_config();
    config.batch_size = 2;
    let harness = TestHarness::with_poller_config(config);
    for i in 0..5 {
        seed(
            &harness,
            &processing_record(&format!("req-{i}"), t0() - Duration::minutes(i)),
        )
        .await;
    }

    let first = harness.poller.run_cycle().await.unwrap();
    assert_eq!(first.examined, 2);
    assert_eq!(first.deferred, 3);
    assert!(!first.cancelled);
    // oldest submissions go first
    assert_eq!(harness.processor.status_calls("job-req-4"), 1);
    assert_eq!(harness.processor.status_calls("job-req-3"), 1);

    harness.poller.run_cycle().await.unwrap();
    harness.poller.run_cycle().await.unwrap();

    for i in 0..5 {
        let record = stored(&harness, &format!("req-{i}")).await.unwrap();
        assert!(record.check_count >= 1, "req-{i} was never checked");
    }
    assert_eq!(harness.processor.total_status_calls(), 6);
}

#[tokio::test]
async fn test_expired_record_times_out_even_when_outside_the_batch() {
    let mut config = test_poller_config();
    config.batch_size = 1;
    let harness = TestHarness::with_poller_config(config);

    let mut old = processing_record("req-old", t0() - Duration::hours(25));
    old.last_checked_at = Some(t0() - Duration::minutes(10));
    old.check_count = 1;
    seed(&harness, &old).await;
    // never checked, so it sorts ahead of the old record in poll order
    seed(&harness, &processing_record("req-new", t0())).await;

    let summary = harness.poller.run_cycle().await.unwrap();

    assert_eq!(summary.examined, 2);
    assert_eq!(summary.timed_out, 1);
    assert_eq!(summary.still_processing, 1);
    assert_eq!(summary.deferred, 0);
    assert_eq!(harness.processor.status_calls("job-req-old"), 0);
    assert_eq!(harness.processor.status_calls("job-req-new"), 1);
    assert_eq!(stored(&harness, "req-old").await, None);
    assert_eq!(harness.bus.events_for("req-old").len(), 1);
    assert_eq!(harness.bus.events_of_type("timed_out").len(), 1);
}

#[tokio::test]
async fn test_backlog_warning_published_above_threshold() {
    let mut config = test_poller_config();
    config.backlog_warning_threshold = 2;
    let harness = TestHarness::with_poller_config(config);
    for id in ["req-x", "req-y", "req-z"] {
        seed(&harness, &processing_record(id, t0() - Duration::hours(2))).await;
    }

    harness.poller.run_cycle().await.unwrap();

    let warnings = harness.bus.events_of_type("backlog_warning");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].details["threshold"], 2);
    assert_eq!(warnings[0].details["backlog"]["pending_count"], 3);
    assert_eq!(warnings[0].details["backlog"]["oldest_age_seconds"], 7200);

    let backlog = harness.poller.backlog().unwrap();
    assert_eq!(backlog.pending_count, 3);
    assert_eq!(backlog.captured_at, t0());
}

#[tokio::test]
async fn test_submitted_item_reconciles_to_completion() {
    let harness = TestHarness::new();
    let request_id = harness
        .orchestrator
        .submit(harness.work_item("uploads/interview.wav"))
        .await
        .unwrap();

    harness.advance(Duration::minutes(5));
    harness.poller.run_cycle().await.unwrap();

    harness
        .processor
        .set_status(&format!("job-{request_id}"), ScriptedStatus::report("completed"));
    harness.advance(Duration::minutes(5));
    harness.poller.run_cycle().await.unwrap();

    let types: Vec<String> = harness
        .bus
        .events_for(&request_id)
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(types, vec!["submitted", "completed"]);
    assert!(harness.store.inner().is_empty());
}
