//! # TrackingRecord
//!
//! Persistent state of one in-flight request, from accepted submission to
//! terminal outcome.
//!
//! ## Lifecycle
//!
//! - Created by the submission orchestrator right after the external processor
//!   accepts the work item (`status = Processing`, `check_count = 0`)
//! - Mutated only by the status poller (`status`, `last_checked_at`,
//!   `check_count`, `last_external_status`, `status_message`, `result`)
//! - Deleted by the status poller once its terminal notification is dispatched

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ProcessingResult;
use crate::state_machine::TrackingStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    /// Caller-facing key; unique and immutable
    pub request_id: String,
    /// Processor-assigned key used for status polling
    pub internal_key: String,
    pub source_locator: String,
    pub destination_locator: String,
    pub created_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Number of status checks performed; never decreases
    pub check_count: u32,
    pub status: TrackingStatus,
    /// Raw status string last reported by the processor
    pub last_external_status: Option<String>,
    /// Human-readable reason for the current status
    pub status_message: Option<String>,
    /// Processor result, kept once the record reaches `Completed` so a
    /// re-dispatched notification still carries it
    #[serde(default)]
    pub result: Option<ProcessingResult>,
}

impl TrackingRecord {
    /// Record for a submission the external processor has just accepted
    pub fn accepted(
        request_id: impl Into<String>,
        internal_key: impl Into<String>,
        source_locator: impl Into<String>,
        destination_locator: impl Into<String>,
        created_at: DateTime<Utc>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            internal_key: internal_key.into(),
            source_locator: source_locator.into(),
            destination_locator: destination_locator.into(),
            created_at,
            submitted_at,
            last_checked_at: None,
            check_count: 0,
            status: TrackingStatus::Processing,
            last_external_status: None,
            status_message: None,
            result: None,
        }
    }

    /// Time elapsed since submission
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.submitted_at)
    }

    /// Whether the record has outlived `max_age` (strictly greater)
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
