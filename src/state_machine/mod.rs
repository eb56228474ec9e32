// State machine module for request reconciliation
//
// Tracking statuses, the external status vocabulary, and the pure transition
// rules applied by the status poller.

pub mod states;
pub mod transitions;
pub mod vocabulary;

pub use states::{ExternalStatus, TrackingStatus};
pub use transitions::{
    check_expiry, reconcile, ReconciliationLimits, StatusObservation, Transition,
    TransitionTrigger, CHECK_LIMIT_REASON,
};
pub use vocabulary::StatusVocabulary;
