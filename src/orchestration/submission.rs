//! # Submission Orchestrator
//!
//! Entry point for new work items:
//!
//! 1. Read the source object and copy it, with merged metadata, to the
//!    destination locator.
//! 2. Submit a description to the external processor.
//! 3. On acceptance, persist a `Processing` tracking record and publish a
//!    `submitted` status event.
//!
//! Any failure before the record is persisted is returned to the caller and
//! leaves no tracking record behind. Transferred content is not rolled back.
//!
//! A work item whose `request_id` already has a record, active or terminal,
//! is acknowledged with that id and never resubmitted.

use opentelemetry::KeyValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::notification_dispatcher::{LifecycleEvent, NotificationDispatcher};
use crate::clock::{Clock, SystemClock};
use crate::config::SubmissionConfig;
use crate::content::ContentStore;
use crate::errors::{ProcessorError, SubmissionError};
use crate::logging::log_lifecycle_event;
use crate::metrics;
use crate::models::{TrackingRecord, WorkItem};
use crate::processor::{ExternalProcessor, WorkItemDescription};
use crate::store::{StoreLookup, TrackingStore};

pub const REQUEST_ID_METADATA_KEY: &str = "tracker-request-id";
pub const SOURCE_LOCATOR_METADATA_KEY: &str = "tracker-source-locator";

const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SubmissionOrchestrator {
    content: Arc<dyn ContentStore>,
    processor: Arc<dyn ExternalProcessor>,
    store: Arc<dyn TrackingStore>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    config: SubmissionConfig,
    submit_timeout: Duration,
}

impl SubmissionOrchestrator {
    pub fn new(
        content: Arc<dyn ContentStore>,
        processor: Arc<dyn ExternalProcessor>,
        store: Arc<dyn TrackingStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            content,
            processor,
            store,
            dispatcher,
            clock: Arc::new(SystemClock),
            config: SubmissionConfig::default(),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    pub fn with_config(mut self, config: SubmissionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Upper bound on the processor's submit call
    pub fn with_submit_timeout(mut self, submit_timeout: Duration) -> Self {
        self.submit_timeout = submit_timeout;
        self
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Submit one work item and start tracking it.
    ///
    /// Returns the caller-facing request id. Redelivering an item whose
    /// `request_id` is already tracked returns that id without transferring
    /// content or resubmitting; the existing record is left untouched.
    pub async fn submit(&self, item: WorkItem) -> Result<String, SubmissionError> {
        if item.source_locator.trim().is_empty() {
            return Err(SubmissionError::InvalidWorkItem(
                "source_locator is empty".to_string(),
            ));
        }

        let request_id = item.resolve_request_id();
        let destination = item.resolve_destination(&self.config.destination_prefix, &request_id);

        debug!(
            request_id = %request_id,
            source_locator = %item.source_locator,
            destination_locator = %destination,
            "Submitting work item"
        );

        let result = self.submit_inner(&item, &request_id, &destination).await;
        if let Err(ref err) = result {
            metrics::submission_rejections_total()
                .add(1, &[KeyValue::new("reason", failure_label(err))]);
            warn!(request_id = %request_id, error = %err, "Submission failed");
        }
        result
    }

    async fn submit_inner(
        &self,
        item: &WorkItem,
        request_id: &str,
        destination: &str,
    ) -> Result<String, SubmissionError> {
        let existing = self
            .store
            .get(request_id)
            .await
            .map_err(|source| SubmissionError::Tracking {
                request_id: request_id.to_string(),
                source,
            })?;
        if let StoreLookup::Found(record) = existing {
            info!(
                request_id = %request_id,
                internal_key = %record.internal_key,
                status = %record.status,
                check_count = record.check_count,
                "Work item already tracked, skipping resubmission"
            );
            return Ok(request_id.to_string());
        }

        let content_error = |source| SubmissionError::ContentTransfer {
            request_id: request_id.to_string(),
            source,
        };

        let source = self
            .content
            .read(&item.source_locator)
            .await
            .map_err(content_error)?;
        let metadata = merge_metadata(&source.metadata, &item.raw_metadata, request_id, &item.source_locator);
        let content_version = self
            .content
            .write(destination, &source.bytes, &metadata)
            .await
            .map_err(content_error)?;

        let description = WorkItemDescription {
            request_id: request_id.to_string(),
            source_locator: item.source_locator.clone(),
            destination_locator: destination.to_string(),
            content_version,
            metadata,
        };

        let response = match timeout(self.submit_timeout, self.processor.submit(&description)).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => {
                return Err(SubmissionError::Processor {
                    request_id: request_id.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(SubmissionError::Processor {
                    request_id: request_id.to_string(),
                    source: ProcessorError::timeout("submit", self.submit_timeout),
                })
            }
        };

        if !response.accepted {
            let reason = response
                .message
                .clone()
                .unwrap_or_else(|| "rejected without a reason".to_string());
            self.notify_rejection(request_id, &item.source_locator, &reason)
                .await;
            return Err(SubmissionError::Rejected {
                request_id: request_id.to_string(),
                reason,
            });
        }

        let Some(external_key) = response.usable_key() else {
            self.notify_rejection(request_id, &item.source_locator, "accepted without an external key")
                .await;
            return Err(SubmissionError::MissingExternalKey {
                request_id: request_id.to_string(),
            });
        };

        let mut record = TrackingRecord::accepted(
            request_id,
            external_key,
            &item.source_locator,
            destination,
            item.created_at,
            self.clock.now(),
        );
        record.last_external_status = response.initial_status.clone();

        self.store
            .upsert(&record)
            .await
            .map_err(|source| SubmissionError::Tracking {
                request_id: request_id.to_string(),
                source,
            })?;

        metrics::submissions_total().add(1, &[]);
        log_lifecycle_event(
            "submitted",
            &record.request_id,
            Some(&record.internal_key),
            record.status.as_str(),
            Some(record.check_count),
            response.initial_status.as_deref(),
        );

        // the record is durable; a lost event does not fail the submission
        if let Err(e) = self
            .dispatcher
            .dispatch(&LifecycleEvent::Submitted { record })
            .await
        {
            warn!(request_id = %request_id, error = %e, "Failed to publish submitted event");
        }

        info!(request_id = %request_id, internal_key = %external_key, "Work item submitted and tracked");
        Ok(request_id.to_string())
    }

    async fn notify_rejection(&self, request_id: &str, source_locator: &str, reason: &str) {
        let event = LifecycleEvent::SubmissionRejected {
            request_id: request_id.to_string(),
            source_locator: source_locator.to_string(),
            reason: reason.to_string(),
        };
        if let Err(e) = self.dispatcher.dispatch(&event).await {
            warn!(request_id = %request_id, error = %e, "Failed to publish rejection notification");
        }
    }
}

/// Source metadata, overlaid by the event's metadata, overlaid by tracker keys
pub fn merge_metadata(
    source: &HashMap<String, String>,
    raw: &HashMap<String, String>,
    request_id: &str,
    source_locator: &str,
) -> HashMap<String, String> {
    let mut merged = source.clone();
    merged.extend(raw.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged.insert(REQUEST_ID_METADATA_KEY.to_string(), request_id.to_string());
    merged.insert(SOURCE_LOCATOR_METADATA_KEY.to_string(), source_locator.to_string());
    merged
}

fn failure_label(err: &SubmissionError) -> &'static str {
    match err {
        SubmissionError::Rejected { .. } => "rejected",
        SubmissionError::MissingExternalKey { .. } => "missing_key",
        SubmissionError::Processor { .. } => "transport",
        SubmissionError::ContentTransfer { .. } => "content",
        SubmissionError::Tracking { .. } => "tracking",
        SubmissionError::InvalidWorkItem(_) => "invalid",
    }
}
