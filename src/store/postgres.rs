//! # PostgreSQL Tracking Store
//!
//! Durable [`TrackingStore`] over a single `tracking_records` table keyed by
//! `request_id`. Upserts use `INSERT ... ON CONFLICT (request_id) DO UPDATE`,
//! which makes them idempotent and last-writer-wins.
//!
//! The schema ships as an sqlx migration under `migrations/`; run it through
//! [`MIGRATOR`] or [`PgTrackingStore::migrate`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};

use super::{DeleteOutcome, RecordQuery, StoreLookup, StoreResult, TrackingStore};
use crate::errors::StoreError;
use crate::metrics;
use crate::models::{ProcessingResult, TrackingRecord};

/// Migrator for the tracking schema
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const SELECT_COLUMNS: &str = "SELECT request_id, internal_key, source_locator, destination_locator, \
     created_at, submitted_at, last_checked_at, check_count, status, \
     last_external_status, status_message, result FROM tracking_records";

/// Raw row shape of `tracking_records`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackingRecordRow {
    pub request_id: String,
    pub internal_key: String,
    pub source_locator: String,
    pub destination_locator: String,
    pub created_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub check_count: i32,
    pub status: String,
    pub last_external_status: Option<String>,
    pub status_message: Option<String>,
    pub result: Option<Json<ProcessingResult>>,
}

impl TryFrom<TrackingRecordRow> for TrackingRecord {
    type Error = StoreError;

    fn try_from(row: TrackingRecordRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|reason| StoreError::CorruptRecord {
            request_id: row.request_id.clone(),
            reason,
        })?;
        let check_count = u32::try_from(row.check_count).map_err(|_| StoreError::CorruptRecord {
            request_id: row.request_id.clone(),
            reason: format!("negative check_count {}", row.check_count),
        })?;

        Ok(TrackingRecord {
            request_id: row.request_id,
            internal_key: row.internal_key,
            source_locator: row.source_locator,
            destination_locator: row.destination_locator,
            created_at: row.created_at,
            submitted_at: row.submitted_at,
            last_checked_at: row.last_checked_at,
            check_count,
            status,
            last_external_status: row.last_external_status,
            status_message: row.status_message,
            result: row.result.map(|Json(result)| result),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgTrackingStore {
    pool: PgPool,
}

impl PgTrackingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::database("migrate", e))
    }

    /// Convert fetched rows, skipping rows that no longer decode. A corrupt
    /// row is logged and counted so the remaining records still reconcile.
    fn decode_rows(rows: Vec<TrackingRecordRow>) -> Vec<TrackingRecord> {
        rows.into_iter()
            .filter_map(|row| {
                let request_id = row.request_id.clone();
                match TrackingRecord::try_from(row) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        error!(
                            request_id = %request_id,
                            error = %e,
                            "Skipping tracking record that failed to decode"
                        );
                        metrics::record_errors_total().add(1, &[KeyValue::new("stage", "decode")]);
                        None
                    }
                }
            })
            .collect()
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &RecordQuery) {
        builder.push(" WHERE TRUE");
        if !query.statuses.is_empty() {
            let statuses: Vec<String> = query.statuses.iter().map(|s| s.to_string()).collect();
            builder.push(" AND status = ANY(");
            builder.push_bind(statuses);
            builder.push(")");
        }
        if let Some(cutoff) = query.submitted_before {
            builder.push(" AND submitted_at < ");
            builder.push_bind(cutoff);
        }
    }
}

#[async_trait]
impl TrackingStore for PgTrackingStore {
    async fn get(&self, request_id: &str) -> StoreResult<StoreLookup> {
        let row = sqlx::query_as::<_, TrackingRecordRow>(&format!(
            "{SELECT_COLUMNS} WHERE request_id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database("get", e))?;

        match row {
            Some(row) => Ok(StoreLookup::Found(row.try_into()?)),
            None => Ok(StoreLookup::NotFound),
        }
    }

    async fn query(&self, query: &RecordQuery) -> StoreResult<Vec<TrackingRecord>> {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        Self::push_filters(&mut builder, query);
        builder.push(" ORDER BY last_checked_at ASC NULLS FIRST, submitted_at ASC, request_id ASC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = builder
            .build_query_as::<TrackingRecordRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::database("query", e))?;

        debug!(rows = rows.len(), "Queried tracking records");

        Ok(Self::decode_rows(rows))
    }

    async fn count(&self, query: &RecordQuery) -> StoreResult<usize> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tracking_records");
        Self::push_filters(&mut builder, query);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::database("count", e))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn upsert(&self, record: &TrackingRecord) -> StoreResult<()> {
        let check_count = i32::try_from(record.check_count).map_err(|_| StoreError::CorruptRecord {
            request_id: record.request_id.clone(),
            reason: format!("check_count {} out of range", record.check_count),
        })?;

        sqlx::query(
            r#"
            INSERT INTO tracking_records (
                request_id, internal_key, source_locator, destination_locator,
                created_at, submitted_at, last_checked_at, check_count, status,
                last_external_status, status_message, result, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            ON CONFLICT (request_id) DO UPDATE SET
                internal_key = EXCLUDED.internal_key,
                source_locator = EXCLUDED.source_locator,
                destination_locator = EXCLUDED.destination_locator,
                created_at = EXCLUDED.created_at,
                submitted_at = EXCLUDED.submitted_at,
                last_checked_at = EXCLUDED.last_checked_at,
                check_count = EXCLUDED.check_count,
                status = EXCLUDED.status,
                last_external_status = EXCLUDED.last_external_status,
                status_message = EXCLUDED.status_message,
                result = EXCLUDED.result,
                updated_at = NOW()
            "#,
        )
        .bind(&record.request_id)
        .bind(&record.internal_key)
        .bind(&record.source_locator)
        .bind(&record.destination_locator)
        .bind(record.created_at)
        .bind(record.submitted_at)
        .bind(record.last_checked_at)
        .bind(check_count)
        .bind(record.status.as_str())
        .bind(&record.last_external_status)
        .bind(&record.status_message)
        .bind(record.result.as_ref().map(Json))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database("upsert", e))?;

        Ok(())
    }

    async fn delete(&self, request_id: &str) -> StoreResult<DeleteOutcome> {
        let result = sqlx::query("DELETE FROM tracking_records WHERE request_id = $1")
            .bind(request_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::database("delete", e))?;

        Ok(if result.rows_affected() > 0 {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::TrackingStatus;

    fn row() -> TrackingRecordRow {
        let now = Utc::now();
        TrackingRecordRow {
            request_id: "req-1".to_string(),
            internal_key: "job-1".to_string(),
            source_locator: "in/a.wav".to_string(),
            destination_locator: "out/a.wav".to_string(),
            created_at: now,
            submitted_at: now,
            last_checked_at: None,
            check_count: 3,
            status: "processing".to_string(),
            last_external_status: Some("RUNNING".to_string()),
            status_message: None,
            result: None,
        }
    }

    #[tokio::test]
    async fn test_store_creation_with_lazy_pool() {
        let pool = PgPool::connect_lazy("postgresql://test").expect("Should create lazy pool");
        let store = PgTrackingStore::new(pool);
        assert!(!store.pool().is_closed());
    }

    #[test]
    fn test_row_conversion() {
        let record = TrackingRecord::try_from(row()).unwrap();
        assert_eq!(record.status, TrackingStatus::Processing);
        assert_eq!(record.check_count, 3);
        assert_eq!(record.last_external_status.as_deref(), Some("RUNNING"));
    }

    #[test]
    fn test_corrupt_rows_rejected() {
        let mut bad_status = row();
        bad_status.status = "exploded".to_string();
        assert!(matches!(
            TrackingRecord::try_from(bad_status),
            Err(StoreError::CorruptRecord { .. })
        ));

        let mut bad_count = row();
        bad_count.check_count = -1;
        assert!(matches!(
            TrackingRecord::try_from(bad_count),
            Err(StoreError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_row_conversion_keeps_result() {
        let mut with_result = row();
        with_result.status = "completed".to_string();
        with_result.result = Some(Json(ProcessingResult {
            display_name: Some("Episode 12".to_string()),
            ..ProcessingResult::default()
        }));

        let record = TrackingRecord::try_from(with_result).unwrap();
        assert_eq!(record.status, TrackingStatus::Completed);
        assert_eq!(
            record.result.and_then(|r| r.display_name).as_deref(),
            Some("Episode 12")
        );
    }

    #[test]
    fn test_corrupt_rows_skipped_without_dropping_batch() {
        let mut bad_status = row();
        bad_status.request_id = "req-2".to_string();
        bad_status.status = "exploded".to_string();

        let mut bad_count = row();
        bad_count.request_id = "req-3".to_string();
        bad_count.check_count = -4;

        let records = PgTrackingStore::decode_rows(vec![bad_status, row(), bad_count]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].request_id, "req-1");
    }
}
