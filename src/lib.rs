#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Lifecycle Tracker
//!
//! Tracks work items handed to an external processing service from
//! submission to a terminal outcome.
//!
//! ## Overview
//!
//! A work item is copied to its destination, submitted to the processor, and
//! recorded in a [`store::TrackingStore`]. A timer-driven
//! [`orchestration::StatusPoller`] then reconciles every tracked record
//! against the processor until it completes, fails, or outlives its maximum
//! age. Each terminal record produces exactly one notification before it is
//! deleted.
//!
//! ## Module Organization
//!
//! - [`models`] - Tracking records, work items, processing results
//! - [`state_machine`] - Tracking statuses, status vocabulary, transition rules
//! - [`store`] - Tracking store trait with in-memory and PostgreSQL backends
//! - [`orchestration`] - Submission, status polling, notification dispatch
//! - [`processor`] - External processor client seam and HTTP client
//! - [`content`] - Content stores used during submission
//! - [`messaging`] - Message bus trait, envelope, broadcast and `pg_notify` buses
//! - [`config`] - Layered configuration
//! - [`errors`] - Error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lifecycle_tracker::config::TrackerConfig;
//! use lifecycle_tracker::messaging::BroadcastBus;
//! use lifecycle_tracker::orchestration::{NotificationDispatcher, StatusPoller};
//! use lifecycle_tracker::processor::HttpProcessorClient;
//! use lifecycle_tracker::state_machine::StatusVocabulary;
//! use lifecycle_tracker::store::InMemoryTrackingStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrackerConfig::default();
//! let dispatcher = Arc::new(NotificationDispatcher::new(
//!     Arc::new(BroadcastBus::default()),
//!     config.notifications.clone(),
//! ));
//! let poller = StatusPoller::new(
//!     Arc::new(InMemoryTrackingStore::new()),
//!     Arc::new(HttpProcessorClient::new(config.processor.clone())?),
//!     dispatcher,
//!     StatusVocabulary::from_config(&config.vocabulary),
//!     config.poller.clone(),
//! );
//!
//! let summary = poller.run_cycle().await?;
//! println!("examined {} records", summary.examined);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod content;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod orchestration;
pub mod processor;
pub mod state_machine;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigManager, TrackerConfig};
pub use errors::{
    ContentError, ProcessorError, PublishError, StoreError, SubmissionError, TrackerError,
    TrackerResult,
};
pub use models::{ProcessingResult, TrackingRecord, WorkItem};
pub use orchestration::{
    CycleSummary, LifecycleEvent, NotificationDispatcher, StatusPoller, SubmissionOrchestrator,
};
pub use state_machine::{ExternalStatus, StatusVocabulary, TrackingStatus};
pub use store::{DeleteOutcome, RecordQuery, StoreLookup, TrackingStore};
