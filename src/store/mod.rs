//! # Tracking Store
//!
//! Keyed store of [`TrackingRecord`]s, the single source of truth for poll
//! state. Writes are last-writer-wins per `request_id`; there is no
//! cross-process locking, and distinct keys never contend.
//!
//! Missing records are reported through [`StoreLookup::NotFound`] and
//! [`DeleteOutcome::NotFound`] rather than as errors, because deletion by the
//! poller can legitimately race with outside bookkeeping.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::errors::StoreError;
use crate::models::TrackingRecord;
use crate::state_machine::TrackingStatus;

pub use memory::InMemoryTrackingStore;
pub use postgres::PgTrackingStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a keyed lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLookup {
    Found(TrackingRecord),
    NotFound,
}

impl StoreLookup {
    pub fn into_option(self) -> Option<TrackingRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Filter for [`TrackingStore::query`]
///
/// An empty status list matches every status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub statuses: Vec<TrackingStatus>,
    /// Only records submitted strictly before this instant
    pub submitted_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_statuses(statuses: impl IntoIterator<Item = TrackingStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Records the poller still has work to do on: active ones plus terminal
    /// ones whose notification or delete did not complete
    pub fn reconcilable() -> Self {
        Self::with_statuses(
            TrackingStatus::ACTIVE
                .into_iter()
                .chain(TrackingStatus::TERMINAL),
        )
    }

    pub fn submitted_before(mut self, instant: DateTime<Utc>) -> Self {
        self.submitted_before = Some(instant);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &TrackingRecord) -> bool {
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&record.status);
        let age_ok = self
            .submitted_before
            .map_or(true, |cutoff| record.submitted_at < cutoff);
        status_ok && age_ok
    }
}

/// Poll order: never-checked records first, then least recently checked, then
/// oldest submission. Every store implementation returns query results in
/// this order so deferred records rotate fairly across cycles.
pub fn poll_order(a: &TrackingRecord, b: &TrackingRecord) -> Ordering {
    match (a.last_checked_at, b.last_checked_at) {
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) if x != y => x.cmp(&y),
        _ => a
            .submitted_at
            .cmp(&b.submitted_at)
            .then_with(|| a.request_id.cmp(&b.request_id)),
    }
}

#[async_trait]
pub trait TrackingStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, request_id: &str) -> StoreResult<StoreLookup>;

    /// Matching records in [`poll_order`]
    async fn query(&self, query: &RecordQuery) -> StoreResult<Vec<TrackingRecord>>;

    /// Matching records, ignoring the query limit
    async fn count(&self, query: &RecordQuery) -> StoreResult<usize>;

    /// Insert or fully replace the record keyed by its `request_id`
    async fn upsert(&self, record: &TrackingRecord) -> StoreResult<()>;

    async fn delete(&self, request_id: &str) -> StoreResult<DeleteOutcome>;
}
