//! # Orchestration
//!
//! The moving parts of the request lifecycle:
//!
//! - [`SubmissionOrchestrator`]: transfers content, submits to the processor,
//!   creates the tracking record
//! - [`StatusPoller`]: periodic reconciliation of tracked records against the
//!   processor until each one is terminal and retired
//! - [`NotificationDispatcher`]: lifecycle events onto the message bus
//! - [`BacklogSnapshot`]: pending-work health signal captured per cycle

pub mod backlog;
pub mod notification_dispatcher;
pub mod status_poller;
pub mod submission;

pub use backlog::{AgeBucket, BacklogSnapshot};
pub use notification_dispatcher::{LifecycleEvent, NotificationDispatcher};
pub use status_poller::{CycleSummary, RecordOutcome, StatusPoller};
pub use submission::{merge_metadata, SubmissionOrchestrator};
