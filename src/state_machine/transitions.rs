//! # Reconciliation Transitions
//!
//! Pure decision logic for one record in one reconciliation pass.
//!
//! ```text
//! Processing --(age > max_age)-------------------------> TimedOut
//! Processing --(external: completed)-------------------> Completed
//! Processing --(external: failed)----------------------> Failed
//! Processing --(external: other / unknown)-------------> Processing (check_count++)
//! Processing --(call error, check_count >= max)--------> Failed
//! Processing --(call error, check_count <  max)--------> Processing (check_count++)
//! ```
//!
//! Every status check, successful or not, increments `check_count`. A
//! non-terminal outcome that reaches `max_check_count` forces `Failed`, so the
//! count never exceeds the limit while the record is still active.

use chrono::{DateTime, Duration, Utc};
use std::time::Duration as StdDuration;

use super::states::{ExternalStatus, TrackingStatus};
use crate::models::TrackingRecord;

pub const CHECK_LIMIT_REASON: &str = "exceeded maximum status checks";

/// Bounds applied to every active record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationLimits {
    pub max_age: Duration,
    pub max_check_count: u32,
}

impl ReconciliationLimits {
    pub fn new(max_age: StdDuration, max_check_count: u32) -> Self {
        Self {
            // ages beyond chrono's range are effectively unbounded
            max_age: Duration::from_std(max_age).unwrap_or_else(|_| Duration::days(365 * 1000)),
            max_check_count,
        }
    }
}

/// Outcome of one status query against the processor
#[derive(Debug, Clone, PartialEq)]
pub enum StatusObservation {
    Reported {
        status: ExternalStatus,
        raw: String,
        message: Option<String>,
    },
    CallFailed {
        reason: String,
    },
}

/// What caused a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionTrigger {
    Expired,
    ExternalCompleted,
    ExternalFailed,
    ExternalInProgress,
    UnrecognizedStatus,
    CallFailed,
    CheckLimitReached,
}

impl TransitionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::ExternalCompleted => "external_completed",
            Self::ExternalFailed => "external_failed",
            Self::ExternalInProgress => "external_in_progress",
            Self::UnrecognizedStatus => "unrecognized_status",
            Self::CallFailed => "call_failed",
            Self::CheckLimitReached => "check_limit_reached",
        }
    }
}

/// A decided transition, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: TrackingStatus,
    pub to: TrackingStatus,
    pub trigger: TransitionTrigger,
    pub check_count: u32,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub external_status: Option<String>,
    pub reason: Option<String>,
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        self.to.is_terminal()
    }

    /// Write the transition's fields onto the record
    pub fn apply_to(&self, record: &mut TrackingRecord) {
        record.status = self.to;
        record.check_count = record.check_count.max(self.check_count);
        if self.last_checked_at.is_some() {
            record.last_checked_at = self.last_checked_at;
        }
        if self.external_status.is_some() {
            record.last_external_status = self.external_status.clone();
        }
        record.status_message = self.reason.clone();
    }
}

/// Time-out check, made before any processor call
pub fn check_expiry(
    record: &TrackingRecord,
    now: DateTime<Utc>,
    limits: &ReconciliationLimits,
) -> Option<Transition> {
    if !record.is_expired(now, limits.max_age) {
        return None;
    }

    Some(Transition {
        from: record.status,
        to: TrackingStatus::TimedOut,
        trigger: TransitionTrigger::Expired,
        check_count: record.check_count,
        last_checked_at: record.last_checked_at,
        external_status: record.last_external_status.clone(),
        reason: Some(format!(
            "exceeded maximum age of {} minutes",
            limits.max_age.num_minutes()
        )),
    })
}

/// Apply a status observation to an active, unexpired record
pub fn reconcile(
    record: &TrackingRecord,
    observation: &StatusObservation,
    now: DateTime<Utc>,
    limits: &ReconciliationLimits,
) -> Transition {
    let check_count = record.check_count.saturating_add(1);
    let limit_reached = check_count >= limits.max_check_count;

    let (to, trigger, external_status, reason) = match observation {
        StatusObservation::Reported {
            status,
            raw,
            message,
        } => match status {
            ExternalStatus::Completed => (
                TrackingStatus::Completed,
                TransitionTrigger::ExternalCompleted,
                Some(raw.clone()),
                message.clone(),
            ),
            ExternalStatus::Failed => (
                TrackingStatus::Failed,
                TransitionTrigger::ExternalFailed,
                Some(raw.clone()),
                Some(
                    message
                        .clone()
                        .unwrap_or_else(|| format!("processor reported status '{raw}'")),
                ),
            ),
            ExternalStatus::InProgress | ExternalStatus::Unknown(_) if limit_reached => (
                TrackingStatus::Failed,
                TransitionTrigger::CheckLimitReached,
                Some(raw.clone()),
                Some(CHECK_LIMIT_REASON.to_string()),
            ),
            ExternalStatus::InProgress => (
                TrackingStatus::Processing,
                TransitionTrigger::ExternalInProgress,
                Some(raw.clone()),
                message.clone(),
            ),
            ExternalStatus::Unknown(_) => (
                TrackingStatus::Processing,
                TransitionTrigger::UnrecognizedStatus,
                Some(raw.clone()),
                Some(format!("unrecognized processor status '{raw}'")),
            ),
        },
        StatusObservation::CallFailed { .. } if limit_reached => (
            TrackingStatus::Failed,
            TransitionTrigger::CheckLimitReached,
            None,
            Some(CHECK_LIMIT_REASON.to_string()),
        ),
        StatusObservation::CallFailed { reason } => (
            TrackingStatus::Processing,
            TransitionTrigger::CallFailed,
            None,
            Some(format!("status check failed: {reason}")),
        ),
    };

    Transition {
        from: record.status,
        to,
        trigger,
        check_count,
        last_checked_at: Some(now),
        external_status,
        reason,
    }
}
