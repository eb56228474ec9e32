//! Wiring for integration tests: every collaborator scripted, time manual.

use chrono::{DateTime, Duration, TimeZone, Utc};
use lifecycle_tracker::clock::{Clock, ManualClock};
use lifecycle_tracker::config::{NotificationConfig, PollerConfig, SubmissionConfig};
use lifecycle_tracker::content::{InMemoryContentStore, StoredObject};
use lifecycle_tracker::models::{TrackingRecord, WorkItem};
use lifecycle_tracker::orchestration::{NotificationDispatcher, StatusPoller, SubmissionOrchestrator};
use lifecycle_tracker::state_machine::StatusVocabulary;
use std::sync::Arc;

use super::mocks::{FaultyStore, RecordingBus, ScriptedProcessor};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub fn test_poller_config() -> PollerConfig {
    PollerConfig {
        poll_interval_seconds: 300,
        max_age_seconds: 24 * 60 * 60,
        max_check_count: 5,
        status_call_timeout_seconds: 1,
        batch_size: 100,
        max_concurrent_checks: 4,
        backlog_warning_threshold: 1000,
        ..PollerConfig::default()
    }
}

/// A Processing record submitted at `submitted_at`
pub fn processing_record(request_id: &str, submitted_at: DateTime<Utc>) -> TrackingRecord {
    TrackingRecord::accepted(
        request_id,
        format!("job-{request_id}"),
        format!("uploads/{request_id}.wav"),
        format!("processing/{request_id}/{request_id}.wav"),
        submitted_at,
        submitted_at,
    )
}

pub struct TestHarness {
    pub clock: ManualClock,
    pub store: Arc<FaultyStore>,
    pub content: Arc<InMemoryContentStore>,
    pub processor: Arc<ScriptedProcessor>,
    pub bus: Arc<RecordingBus>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub poller: Arc<StatusPoller>,
    pub orchestrator: SubmissionOrchestrator,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_poller_config(test_poller_config())
    }

    pub fn with_poller_config(config: PollerConfig) -> Self {
        let clock = ManualClock::new(t0());
        let store = Arc::new(FaultyStore::new());
        let content = Arc::new(InMemoryContentStore::new());
        let processor = Arc::new(ScriptedProcessor::new());
        let bus = Arc::new(RecordingBus::new());

        let dispatcher = Arc::new(
            NotificationDispatcher::new(bus.clone(), NotificationConfig::default())
                .with_clock(Arc::new(clock.clone())),
        );

        let poller = Arc::new(
            StatusPoller::new(
                store.clone(),
                processor.clone(),
                dispatcher.clone(),
                StatusVocabulary::default(),
                config,
            )
            .with_clock(Arc::new(clock.clone())),
        );

        let orchestrator = SubmissionOrchestrator::new(
            content.clone(),
            processor.clone(),
            store.clone(),
            dispatcher.clone(),
        )
        .with_config(SubmissionConfig::default())
        .with_clock(Arc::new(clock.clone()))
        .with_submit_timeout(std::time::Duration::from_secs(1));

        Self {
            clock,
            store,
            content,
            processor,
            bus,
            dispatcher,
            poller,
            orchestrator,
        }
    }

    /// Put a source object in place and return a work item pointing at it
    pub fn work_item(&self, source_locator: &str) -> WorkItem {
        self.content.insert(
            source_locator,
            StoredObject::new(b"RIFF....WAVE".to_vec()).with_metadata("content-type", "audio/wav"),
        );
        WorkItem::new(source_locator, self.clock.now())
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}
