//! Wire shape of every outbound message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Which topic family a message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Per-request lifecycle changes
    Status,
    /// Operational notices not tied to a tracked record
    Notification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl EventEnvelope {
    pub fn new(
        event_type: impl Into<String>,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            timestamp,
            message: message.into(),
            details,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
