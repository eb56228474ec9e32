//! # Notification Dispatcher
//!
//! Turns lifecycle events into [`EventEnvelope`]s and publishes them on the
//! topic for their category. Delivery is at-least-once and nothing is
//! deduplicated here; consumers must be idempotent.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use super::backlog::BacklogSnapshot;
use crate::clock::{Clock, SystemClock};
use crate::config::NotificationConfig;
use crate::errors::PublishError;
use crate::messaging::{EventCategory, EventEnvelope, MessageBus};
use crate::models::{ProcessingResult, TrackingRecord};
use crate::state_machine::TrackingStatus;

/// Something worth telling the outside world about
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Submitted {
        record: TrackingRecord,
    },
    Completed {
        record: TrackingRecord,
        result: Option<ProcessingResult>,
    },
    Failed {
        record: TrackingRecord,
    },
    TimedOut {
        record: TrackingRecord,
    },
    SubmissionRejected {
        request_id: String,
        source_locator: String,
        reason: String,
    },
    BacklogWarning {
        snapshot: BacklogSnapshot,
        threshold: usize,
    },
}

impl LifecycleEvent {
    /// Terminal event for a record, or `None` if the record is still active
    pub fn terminal(record: TrackingRecord, result: Option<ProcessingResult>) -> Option<Self> {
        match record.status {
            TrackingStatus::Completed => Some(Self::Completed { record, result }),
            TrackingStatus::Failed => Some(Self::Failed { record }),
            TrackingStatus::TimedOut => Some(Self::TimedOut { record }),
            TrackingStatus::Submitted | TrackingStatus::Processing => None,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "submitted",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
            Self::SubmissionRejected { .. } => "submission_rejected",
            Self::BacklogWarning { .. } => "backlog_warning",
        }
    }

    pub fn category(&self) -> EventCategory {
        match self {
            Self::Submitted { .. }
            | Self::Completed { .. }
            | Self::Failed { .. }
            | Self::TimedOut { .. } => EventCategory::Status,
            Self::SubmissionRejected { .. } | Self::BacklogWarning { .. } => {
                EventCategory::Notification
            }
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Submitted { record }
            | Self::Completed { record, .. }
            | Self::Failed { record }
            | Self::TimedOut { record } => Some(&record.request_id),
            Self::SubmissionRejected { request_id, .. } => Some(request_id),
            Self::BacklogWarning { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Submitted { record } => {
                format!("Request {} submitted for processing", record.request_id)
            }
            Self::Completed { record, result } => {
                let name = result
                    .as_ref()
                    .and_then(|r| r.display_name.as_deref())
                    .unwrap_or(&record.source_locator);
                format!("Request {} completed: {}", record.request_id, name)
            }
            Self::Failed { record } => format!(
                "Request {} failed: {}",
                record.request_id,
                record.status_message.as_deref().unwrap_or("no reason given")
            ),
            Self::TimedOut { record } => format!(
                "Request {} timed out: {}",
                record.request_id,
                record.status_message.as_deref().unwrap_or("exceeded maximum age")
            ),
            Self::SubmissionRejected {
                request_id, reason, ..
            } => format!("Submission of {request_id} rejected: {reason}"),
            Self::BacklogWarning {
                snapshot,
                threshold,
            } => format!(
                "{} pending requests exceed backlog threshold of {}",
                snapshot.pending_count, threshold
            ),
        }
    }

    pub fn details(&self) -> Value {
        match self {
            Self::Submitted { record } | Self::Failed { record } | Self::TimedOut { record } => {
                record_details(record)
            }
            Self::Completed { record, result } => {
                let mut details = record_details(record);
                if let (Value::Object(map), Some(result)) = (&mut details, result) {
                    map.insert("result".to_string(), json!(result));
                }
                details
            }
            Self::SubmissionRejected {
                request_id,
                source_locator,
                reason,
            } => json!({
                "request_id": request_id,
                "source_locator": source_locator,
                "reason": reason,
            }),
            Self::BacklogWarning {
                snapshot,
                threshold,
            } => json!({
                "threshold": threshold,
                "backlog": snapshot,
            }),
        }
    }
}

fn record_details(record: &TrackingRecord) -> Value {
    json!({
        "request_id": record.request_id,
        "internal_key": record.internal_key,
        "source_locator": record.source_locator,
        "destination_locator": record.destination_locator,
        "status": record.status.as_str(),
        "check_count": record.check_count,
        "status_reason": record.status_message,
        "external_status": record.last_external_status,
        "submitted_at": record.submitted_at,
    })
}

#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    bus: Arc<dyn MessageBus>,
    config: NotificationConfig,
    clock: Arc<dyn Clock>,
}

impl NotificationDispatcher {
    pub fn new(bus: Arc<dyn MessageBus>, config: NotificationConfig) -> Self {
        Self {
            bus,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn topic_for(&self, category: EventCategory) -> &str {
        match category {
            EventCategory::Status => &self.config.status_topic,
            EventCategory::Notification => &self.config.notification_topic,
        }
    }

    /// Publish `event` and return the envelope that went out
    pub async fn dispatch(&self, event: &LifecycleEvent) -> Result<EventEnvelope, PublishError> {
        let envelope = EventEnvelope::new(
            event.event_type(),
            self.clock.now(),
            event.message(),
            event.details(),
        );
        let topic = self.topic_for(event.category());

        self.bus.publish(topic, &envelope).await?;

        debug!(
            topic = %topic,
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            request_id = event.request_id(),
            "Dispatched lifecycle event"
        );
        Ok(envelope)
    }
}
