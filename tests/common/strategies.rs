use lifecycle_tracker::state_machine::{ExternalStatus, StatusObservation};
use proptest::prelude::*;

/// Raw statuses mapped through the default vocabulary, plus some it does not know
pub fn raw_status_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("completed".to_string()),
        Just("SUCCESS".to_string()),
        Just("failed".to_string()),
        Just("Cancelled".to_string()),
        Just("running".to_string()),
        Just("QUEUED".to_string()),
        "[a-z]{3,10}".prop_map(|s| format!("x-{s}")),
    ]
}

pub fn observation_strategy() -> impl Strategy<Value = StatusObservation> {
    prop_oneof![
        3 => prop_oneof![
            Just(ExternalStatus::Completed),
            Just(ExternalStatus::Failed),
            Just(ExternalStatus::InProgress),
            "[a-z]{1,8}".prop_map(ExternalStatus::Unknown),
        ]
        .prop_map(|status| StatusObservation::Reported {
            raw: status.to_string(),
            status,
            message: None,
        }),
        1 => "[a-z ]{1,20}".prop_map(|reason| StatusObservation::CallFailed { reason }),
    ]
}

/// Sequences of observations a record may see over its lifetime
pub fn observation_sequence_strategy() -> impl Strategy<Value = Vec<StatusObservation>> {
    prop::collection::vec(observation_strategy(), 1..40)
}
