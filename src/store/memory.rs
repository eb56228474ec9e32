//! In-process tracking store backed by a `DashMap`.
//!
//! Per-key sharded locking: writers to different `request_id`s never contend.
//! Contents are lost on restart, so this store suits tests and single-process
//! deployments that can tolerate re-submission.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use super::{poll_order, DeleteOutcome, RecordQuery, StoreLookup, StoreResult, TrackingStore};
use crate::models::TrackingRecord;

#[derive(Debug, Clone, Default)]
pub struct InMemoryTrackingStore {
    records: Arc<DashMap<String, TrackingRecord>>,
}

impl InMemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TrackingStore for InMemoryTrackingStore {
    async fn get(&self, request_id: &str) -> StoreResult<StoreLookup> {
        Ok(match self.records.get(request_id) {
            Some(entry) => StoreLookup::Found(entry.value().clone()),
            None => StoreLookup::NotFound,
        })
    }

    async fn query(&self, query: &RecordQuery) -> StoreResult<Vec<TrackingRecord>> {
        let mut matching: Vec<TrackingRecord> = self
            .records
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by(poll_order);
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn count(&self, query: &RecordQuery) -> StoreResult<usize> {
        Ok(self
            .records
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .count())
    }

    async fn upsert(&self, record: &TrackingRecord) -> StoreResult<()> {
        self.records
            .insert(record.request_id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, request_id: &str) -> StoreResult<DeleteOutcome> {
        Ok(match self.records.remove(request_id) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        })
    }
}
