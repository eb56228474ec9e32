//! Backlog health signal computed at the start of each reconciliation cycle.

use chrono::{DateTime, Duration, Utc};
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};

use crate::metrics;
use crate::models::TrackingRecord;
use crate::state_machine::TrackingStatus;
use crate::store::{RecordQuery, StoreResult, TrackingStore};

/// Age thresholds reported as cumulative buckets, in minutes
pub const AGE_BUCKET_MINUTES: [i64; 4] = [5, 60, 360, 1440];

/// Count of active records older than a threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBucket {
    pub older_than_minutes: i64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogSnapshot {
    pub captured_at: DateTime<Utc>,
    /// Active records waiting on the processor
    pub pending_count: usize,
    /// Terminal records whose notification or delete has not completed yet
    pub stranded_count: usize,
    /// Age of the oldest active record in the scanned batch; exact whenever
    /// the whole backlog fits in one batch
    pub oldest_age_seconds: Option<i64>,
    pub age_buckets: Vec<AgeBucket>,
}

impl BacklogSnapshot {
    /// Count the backlog in the store. `batch` is the slice of records the
    /// current cycle is about to process.
    pub async fn capture(
        store: &dyn TrackingStore,
        now: DateTime<Utc>,
        batch: &[TrackingRecord],
    ) -> StoreResult<Self> {
        let active = RecordQuery::with_statuses(TrackingStatus::ACTIVE);
        let pending_count = store.count(&active).await?;
        let stranded_count = store
            .count(&RecordQuery::with_statuses(TrackingStatus::TERMINAL))
            .await?;

        let mut age_buckets = Vec::with_capacity(AGE_BUCKET_MINUTES.len());
        for minutes in AGE_BUCKET_MINUTES {
            let cutoff = now - Duration::minutes(minutes);
            let count = store.count(&active.clone().submitted_before(cutoff)).await?;
            age_buckets.push(AgeBucket {
                older_than_minutes: minutes,
                count,
            });
        }

        let oldest_age_seconds = batch
            .iter()
            .filter(|record| record.status.is_active())
            .map(|record| record.age(now).num_seconds())
            .max();

        Ok(Self {
            captured_at: now,
            pending_count,
            stranded_count,
            oldest_age_seconds,
            age_buckets,
        })
    }

    /// Records still owed work by the poller
    pub fn reconcilable_count(&self) -> usize {
        self.pending_count + self.stranded_count
    }

    pub fn exceeds(&self, threshold: usize) -> bool {
        self.pending_count > threshold
    }

    pub fn record_metrics(&self, batch: &[TrackingRecord]) {
        metrics::pending_records().record(self.pending_count as u64, &[]);
        for record in batch.iter().filter(|r| r.status.is_active()) {
            metrics::pending_age_seconds().record(
                record.age(self.captured_at).num_seconds().max(0) as f64,
                &[KeyValue::new("status", record.status.as_str())],
            );
        }
    }
}
