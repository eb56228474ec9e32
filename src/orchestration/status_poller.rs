//! # Status Poller
//!
//! Timer-driven reconciliation loop. Each cycle:
//!
//! 1. Loads every active record past `max_age`, then up to `batch_size`
//!    reconcilable records in poll order; the rest wait for the next cycle.
//! 2. Captures a [`BacklogSnapshot`], records metrics, and warns when the
//!    pending count crosses `backlog_warning_threshold`.
//! 3. Reconciles records on a pool of `max_concurrent_checks`. A failure on
//!    one record is logged and counted; it never aborts the cycle.
//! 4. Stops pulling new records once shutdown is signalled. Records already
//!    in flight finish, and their state is durable.
//!
//! Terminal records are retired in three steps: persist the terminal status,
//! publish the terminal notification, delete the record. If the publish or
//! delete fails, the record stays terminal in the store and is retried on the
//! next cycle without contacting the processor again.
//!
//! Only one poller should own a given store. Two unfenced pollers may both
//! notify for the same record.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use opentelemetry::KeyValue;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::backlog::BacklogSnapshot;
use super::notification_dispatcher::{LifecycleEvent, NotificationDispatcher};
use crate::clock::{Clock, SystemClock};
use crate::config::PollerConfig;
use crate::errors::{ProcessorError, TrackerError, TrackerResult};
use crate::logging::{log_error, log_lifecycle_event};
use crate::metrics;
use crate::models::{ProcessingResult, TrackingRecord};
use crate::processor::ExternalProcessor;
use crate::state_machine::{
    check_expiry, reconcile, ReconciliationLimits, StatusObservation, StatusVocabulary,
    TrackingStatus,
};
use crate::store::{DeleteOutcome, RecordQuery, TrackingStore};

/// Counts from one reconciliation cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    /// Records reconciled this cycle
    pub examined: usize,
    /// Records that moved to `Completed` this cycle
    pub completed: usize,
    /// Records that moved to `Failed` this cycle
    pub failed: usize,
    /// Records that moved to `TimedOut` this cycle
    pub timed_out: usize,
    /// Records left `Submitted` or `Processing` after their check
    pub still_processing: usize,
    /// Records deleted after their terminal notification
    pub retired: usize,
    /// Records whose persist, publish or delete failed
    pub errors: usize,
    /// Reconcilable records left for a later cycle
    pub deferred: usize,
    /// Shutdown stopped the cycle before every loaded record was examined
    pub cancelled: bool,
}

impl CycleSummary {
    fn absorb(&mut self, outcome: RecordOutcome) {
        self.examined += 1;
        match outcome.transitioned_to {
            Some(TrackingStatus::Completed) => self.completed += 1,
            Some(TrackingStatus::Failed) => self.failed += 1,
            Some(TrackingStatus::TimedOut) => self.timed_out += 1,
            _ => {}
        }
        if outcome.still_processing {
            self.still_processing += 1;
        }
        if outcome.retired {
            self.retired += 1;
        }
        if outcome.error {
            self.errors += 1;
        }
    }

    pub fn terminal(&self) -> usize {
        self.completed + self.failed + self.timed_out
    }
}

/// Result of reconciling a single record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Terminal status reached during this check, if any
    pub transitioned_to: Option<TrackingStatus>,
    pub still_processing: bool,
    pub retired: bool,
    pub error: bool,
}

pub struct StatusPoller {
    poller_id: Uuid,
    store: Arc<dyn TrackingStore>,
    processor: Arc<dyn ExternalProcessor>,
    dispatcher: Arc<NotificationDispatcher>,
    vocabulary: Arc<StatusVocabulary>,
    clock: Arc<dyn Clock>,
    config: PollerConfig,
    limits: ReconciliationLimits,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    last_backlog: RwLock<Option<BacklogSnapshot>>,
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("poller_id", &self.poller_id)
            .field("config", &self.config)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl StatusPoller {
    pub fn new(
        store: Arc<dyn TrackingStore>,
        processor: Arc<dyn ExternalProcessor>,
        dispatcher: Arc<NotificationDispatcher>,
        vocabulary: StatusVocabulary,
        config: PollerConfig,
    ) -> Self {
        let limits = ReconciliationLimits::new(config.max_age(), config.max_check_count);
        let (shutdown, _) = watch::channel(false);
        let poller_id = Uuid::new_v4();

        debug!(poller_id = %poller_id, "Created status poller");

        Self {
            poller_id,
            store,
            processor,
            dispatcher,
            vocabulary: Arc::new(vocabulary),
            clock: Arc::new(SystemClock),
            config,
            limits,
            shutdown,
            handle: Mutex::new(None),
            last_backlog: RwLock::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn poller_id(&self) -> Uuid {
        self.poller_id
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn limits(&self) -> &ReconciliationLimits {
        &self.limits
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Backlog captured by the most recent cycle, for health checks
    pub fn backlog(&self) -> Option<BacklogSnapshot> {
        self.last_backlog.read().clone()
    }

    /// Ask any running cycle to stop pulling records. Cycles started
    /// afterwards examine nothing until [`StatusPoller::start`] is called.
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Spawn the interval loop. Missed ticks are skipped rather than bunched.
    pub fn start(self: &Arc<Self>) -> TrackerResult<()> {
        if !self.config.enabled {
            info!(poller_id = %self.poller_id, "Status poller disabled by configuration");
            return Ok(());
        }

        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(TrackerError::InvalidState(format!(
                "status poller {} is already running",
                self.poller_id
            )));
        }

        self.shutdown.send_replace(false);
        let mut shutdown_rx = self.shutdown.subscribe();
        let poller = Arc::clone(self);

        info!(
            poller_id = %self.poller_id,
            poll_interval_seconds = self.config.poll_interval_seconds,
            batch_size = self.config.batch_size,
            max_concurrent_checks = self.config.max_concurrent_checks,
            "Starting status poller"
        );

        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval(poller.config.poll_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                if *shutdown_rx.borrow() {
                    break;
                }

                if let Err(e) = poller.run_cycle().await {
                    log_error(
                        "status_poller",
                        "run_cycle",
                        &e.to_string(),
                        Some(&poller.poller_id.to_string()),
                    );
                }
            }

            info!(poller_id = %poller.poller_id, "Status poller stopped");
        }));

        Ok(())
    }

    /// Signal shutdown and wait for the loop to exit
    pub async fn stop(&self) {
        info!(poller_id = %self.poller_id, "Stopping status poller");
        self.request_shutdown();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(poller_id = %self.poller_id, error = %e, "Status poller task ended abnormally");
            }
        }
    }

    /// Run one reconciliation pass over the store
    pub async fn run_cycle(&self) -> TrackerResult<CycleSummary> {
        let started = Instant::now();
        let mut summary = CycleSummary::default();

        if self.is_shutdown_requested() {
            summary.cancelled = true;
            debug!(poller_id = %self.poller_id, "Shutdown requested, skipping cycle");
            return Ok(summary);
        }

        let now = self.clock.now();
        let records = self.load_cycle_records(now).await?;
        let loaded = records.len();

        let backlog = BacklogSnapshot::capture(self.store.as_ref(), now, &records).await?;
        backlog.record_metrics(&records);
        summary.deferred = backlog.reconcilable_count().saturating_sub(loaded);
        self.report_backlog(&backlog).await;
        *self.last_backlog.write() = Some(backlog);

        let shutdown_rx = self.shutdown.subscribe();
        let outcomes: Vec<RecordOutcome> = stream::iter(records)
            .take_while(|_| futures::future::ready(!*shutdown_rx.borrow()))
            .map(|record| self.reconcile_record(record))
            .buffer_unordered(self.config.max_concurrent_checks.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            summary.absorb(outcome);
        }
        if summary.examined < loaded {
            summary.cancelled = true;
            summary.deferred += loaded - summary.examined;
        }

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::cycle_duration().record(
            duration_ms,
            &[KeyValue::new("cancelled", summary.cancelled)],
        );

        if summary.examined > 0 || summary.cancelled {
            info!(
                poller_id = %self.poller_id,
                examined = summary.examined,
                completed = summary.completed,
                failed = summary.failed,
                timed_out = summary.timed_out,
                still_processing = summary.still_processing,
                retired = summary.retired,
                errors = summary.errors,
                deferred = summary.deferred,
                cancelled = summary.cancelled,
                duration_ms = duration_ms,
                "Reconciliation cycle completed"
            );
        } else {
            debug!(poller_id = %self.poller_id, "No records to reconcile this cycle");
        }

        Ok(summary)
    }

    /// Every expired active record, then up to `batch_size` reconcilable
    /// records in poll order. Expired records skip the batch limit because
    /// timing them out needs no processor call.
    async fn load_cycle_records(&self, now: DateTime<Utc>) -> TrackerResult<Vec<TrackingRecord>> {
        let expired_query = RecordQuery::with_statuses(TrackingStatus::ACTIVE)
            .submitted_before(now - self.limits.max_age);
        let mut records = self.store.query(&expired_query).await?;

        let batch = self
            .store
            .query(&RecordQuery::reconcilable().limit(self.config.batch_size))
            .await?;

        let expired: HashSet<String> = records.iter().map(|r| r.request_id.clone()).collect();
        if !expired.is_empty() {
            debug!(
                poller_id = %self.poller_id,
                expired = expired.len(),
                "Loaded expired records ahead of the batch"
            );
        }
        records.extend(
            batch
                .into_iter()
                .filter(|record| !expired.contains(&record.request_id)),
        );
        Ok(records)
    }

    async fn report_backlog(&self, backlog: &BacklogSnapshot) {
        let threshold = self.config.backlog_warning_threshold;
        if !backlog.exceeds(threshold) {
            return;
        }

        warn!(
            poller_id = %self.poller_id,
            pending = backlog.pending_count,
            threshold = threshold,
            oldest_age_seconds = backlog.oldest_age_seconds,
            "Pending backlog exceeds warning threshold"
        );
        let event = LifecycleEvent::BacklogWarning {
            snapshot: backlog.clone(),
            threshold,
        };
        if let Err(e) = self.dispatcher.dispatch(&event).await {
            warn!(poller_id = %self.poller_id, error = %e, "Failed to publish backlog warning");
        }
    }

    /// Reconcile one record. Never fails: problems are logged and reported
    /// through the outcome so the rest of the batch carries on.
    pub async fn reconcile_record(&self, mut record: TrackingRecord) -> RecordOutcome {
        let mut outcome = RecordOutcome::default();

        if record.is_terminal() {
            debug!(
                request_id = %record.request_id,
                status = %record.status,
                "Retiring terminal record left by an earlier cycle"
            );
            self.retire(record, &mut outcome).await;
            return outcome;
        }

        let now = self.clock.now();
        let (transition, result) = match check_expiry(&record, now, &self.limits) {
            Some(transition) => (transition, None),
            None => {
                let (observation, result) = self.observe(&record).await;
                (reconcile(&record, &observation, now, &self.limits), result)
            }
        };
        transition.apply_to(&mut record);
        if record.status == TrackingStatus::Completed {
            record.result = result;
        }

        if let Err(e) = self.store.upsert(&record).await {
            error!(
                request_id = %record.request_id,
                status = %record.status,
                error = %e,
                "Failed to persist reconciled record"
            );
            metrics::record_errors_total().add(1, &[KeyValue::new("stage", "persist")]);
            outcome.error = true;
            return outcome;
        }

        if !transition.is_terminal() {
            debug!(
                request_id = %record.request_id,
                internal_key = %record.internal_key,
                check_count = record.check_count,
                trigger = transition.trigger.as_str(),
                "Record still processing"
            );
            outcome.still_processing = true;
            return outcome;
        }

        outcome.transitioned_to = Some(record.status);
        metrics::terminal_transitions_total()
            .add(1, &[KeyValue::new("status", record.status.as_str())]);
        log_lifecycle_event(
            transition.trigger.as_str(),
            &record.request_id,
            Some(&record.internal_key),
            record.status.as_str(),
            Some(record.check_count),
            record.status_message.as_deref(),
        );

        self.retire(record, &mut outcome).await;
        outcome
    }

    async fn observe(
        &self,
        record: &TrackingRecord,
    ) -> (StatusObservation, Option<ProcessingResult>) {
        let call_timeout = self.config.status_call_timeout();
        let call = self.processor.get_status(&record.internal_key);

        let error = match timeout(call_timeout, call).await {
            Ok(Ok(report)) => {
                if let Some(result) = report.result.as_ref().filter(|r| !r.is_supported_version()) {
                    warn!(
                        request_id = %record.request_id,
                        schema_version = result.schema_version,
                        "Processing result has a newer schema version; unknown fields ignored"
                    );
                }
                let status = self.vocabulary.classify(&report.status);
                return (
                    StatusObservation::Reported {
                        status,
                        raw: report.status,
                        message: report.message,
                    },
                    report.result,
                );
            }
            Ok(Err(e)) => e,
            Err(_) => ProcessorError::timeout("get_status", call_timeout),
        };

        warn!(
            request_id = %record.request_id,
            internal_key = %record.internal_key,
            check_count = record.check_count,
            error = %error,
            "Status check failed"
        );
        metrics::status_check_failures_total().add(1, &[]);
        (
            StatusObservation::CallFailed {
                reason: error.to_string(),
            },
            None,
        )
    }

    async fn retire(&self, record: TrackingRecord, outcome: &mut RecordOutcome) {
        let request_id = record.request_id.clone();
        let result = record.result.clone();
        let Some(event) = LifecycleEvent::terminal(record, result) else {
            outcome.error = true;
            return;
        };

        if let Err(e) = self.dispatcher.dispatch(&event).await {
            error!(
                request_id = %request_id,
                event_type = event.event_type(),
                error = %e,
                "Failed to dispatch terminal notification; record kept for retry"
            );
            metrics::record_errors_total().add(1, &[KeyValue::new("stage", "dispatch")]);
            outcome.error = true;
            return;
        }

        match self.store.delete(&request_id).await {
            Ok(DeleteOutcome::Deleted) => outcome.retired = true,
            Ok(DeleteOutcome::NotFound) => {
                debug!(request_id = %request_id, "Record already removed");
                outcome.retired = true;
            }
            Err(e) => {
                error!(
                    request_id = %request_id,
                    error = %e,
                    "Failed to delete notified record; it will be re-notified next cycle"
                );
                metrics::record_errors_total().add(1, &[KeyValue::new("stage", "delete")]);
                outcome.error = true;
            }
        }
    }
}
