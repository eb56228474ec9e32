//! Scripted collaborators for driving the tracker deterministically.

use async_trait::async_trait;
use dashmap::DashMap;
use lifecycle_tracker::errors::{ProcessorError, PublishError, StoreError};
use lifecycle_tracker::messaging::{EventEnvelope, MessageBus};
use lifecycle_tracker::models::{ProcessingResult, TrackingRecord};
use lifecycle_tracker::processor::{
    ExternalProcessor, ProcessorResult, StatusReport, SubmitResponse, WorkItemDescription,
};
use lifecycle_tracker::store::{
    DeleteOutcome, InMemoryTrackingStore, RecordQuery, StoreLookup, StoreResult, TrackingStore,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// What the processor answers for one external key
#[derive(Debug, Clone)]
pub enum ScriptedStatus {
    Report {
        status: String,
        message: Option<String>,
        result: Option<ProcessingResult>,
    },
    Error(String),
    /// Never answers within any sensible timeout
    Hang,
}

impl ScriptedStatus {
    pub fn report(status: &str) -> Self {
        Self::Report {
            status: status.to_string(),
            message: None,
            result: None,
        }
    }
}

/// How the processor answers submissions
#[derive(Debug, Clone)]
pub enum SubmitBehavior {
    /// Accept, keying the job as `job-{request_id}`
    Accept,
    Reject(String),
    AcceptWithoutKey,
    Error(String),
}

#[derive(Debug)]
pub struct ScriptedProcessor {
    statuses: DashMap<String, ScriptedStatus>,
    submit_behavior: Mutex<SubmitBehavior>,
    submissions: Mutex<Vec<WorkItemDescription>>,
    status_calls: DashMap<String, usize>,
}

impl Default for ScriptedProcessor {
    fn default() -> Self {
        Self {
            statuses: DashMap::new(),
            submit_behavior: Mutex::new(SubmitBehavior::Accept),
            submissions: Mutex::new(Vec::new()),
            status_calls: DashMap::new(),
        }
    }
}

impl ScriptedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, external_key: &str, status: ScriptedStatus) {
        self.statuses.insert(external_key.to_string(), status);
    }

    pub fn set_submit_behavior(&self, behavior: SubmitBehavior) {
        *self.submit_behavior.lock() = behavior;
    }

    pub fn submissions(&self) -> Vec<WorkItemDescription> {
        self.submissions.lock().clone()
    }

    pub fn status_calls(&self, external_key: &str) -> usize {
        self.status_calls.get(external_key).map_or(0, |c| *c)
    }

    pub fn total_status_calls(&self) -> usize {
        self.status_calls.iter().map(|entry| *entry.value()).sum()
    }
}

#[async_trait]
impl ExternalProcessor for ScriptedProcessor {
    async fn submit(&self, description: &WorkItemDescription) -> ProcessorResult<SubmitResponse> {
        self.submissions.lock().push(description.clone());
        let behavior = self.submit_behavior.lock().clone();
        match behavior {
            SubmitBehavior::Accept => {
                let mut response = SubmitResponse::accepted(format!("job-{}", description.request_id));
                response.initial_status = Some("queued".to_string());
                Ok(response)
            }
            SubmitBehavior::Reject(message) => Ok(SubmitResponse::rejected(message)),
            SubmitBehavior::AcceptWithoutKey => Ok(SubmitResponse {
                accepted: true,
                external_key: None,
                initial_status: None,
                message: None,
            }),
            SubmitBehavior::Error(message) => Err(ProcessorError::RequestFailed(message)),
        }
    }

    async fn get_status(&self, external_key: &str) -> ProcessorResult<StatusReport> {
        *self.status_calls.entry(external_key.to_string()).or_insert(0) += 1;
        let scripted = self
            .statuses
            .get(external_key)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| ScriptedStatus::report("processing"));

        match scripted {
            ScriptedStatus::Report {
                status,
                message,
                result,
            } => {
                let mut report = StatusReport::new(status);
                if let Some(message) = message {
                    report = report.with_message(message);
                }
                if let Some(result) = result {
                    report = report.with_result(result);
                }
                Ok(report)
            }
            ScriptedStatus::Error(message) => Err(ProcessorError::RequestFailed(message)),
            ScriptedStatus::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProcessorError::RequestFailed("hung call returned".to_string()))
            }
        }
    }
}

/// Bus that records every publish and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, EventEnvelope)>>,
    fail: AtomicBool,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, EventEnvelope)> {
        self.published.lock().clone()
    }

    /// Envelopes of one event type, in publish order
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published
            .lock()
            .iter()
            .filter(|(_, envelope)| envelope.event_type == event_type)
            .map(|(_, envelope)| envelope.clone())
            .collect()
    }

    /// Envelopes mentioning `request_id` in their details
    pub fn events_for(&self, request_id: &str) -> Vec<EventEnvelope> {
        self.published
            .lock()
            .iter()
            .filter(|(_, envelope)| envelope.details["request_id"] == request_id)
            .map(|(_, envelope)| envelope.clone())
            .collect()
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> Result<(), PublishError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::Transport {
                topic: topic.to_string(),
                reason: "bus unavailable".to_string(),
            });
        }
        self.published
            .lock()
            .push((topic.to_string(), envelope.clone()));
        Ok(())
    }
}

/// In-memory store with injectable faults
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: InMemoryTrackingStore,
    fail_upserts_for: Mutex<HashSet<String>>,
    fail_deletes: AtomicBool,
    upserts: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryTrackingStore {
        &self.inner
    }

    pub fn fail_upserts_for(&self, request_id: &str) {
        self.fail_upserts_for.lock().insert(request_id.to_string());
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackingStore for FaultyStore {
    async fn get(&self, request_id: &str) -> StoreResult<StoreLookup> {
        self.inner.get(request_id).await
    }

    async fn query(&self, query: &RecordQuery) -> StoreResult<Vec<TrackingRecord>> {
        self.inner.query(query).await
    }

    async fn count(&self, query: &RecordQuery) -> StoreResult<usize> {
        self.inner.count(query).await
    }

    async fn upsert(&self, record: &TrackingRecord) -> StoreResult<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_upserts_for.lock().contains(&record.request_id) {
            return Err(StoreError::Unavailable("injected upsert failure".to_string()));
        }
        self.inner.upsert(record).await
    }

    async fn delete(&self, request_id: &str) -> StoreResult<DeleteOutcome> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected delete failure".to_string()));
        }
        self.inner.delete(request_id).await
    }
}
