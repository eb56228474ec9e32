//! Work items delivered by the event source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One qualifying object-creation event, ready for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub source_locator: String,
    pub created_at: DateTime<Utc>,
    /// Metadata carried by the triggering event
    #[serde(default)]
    pub raw_metadata: HashMap<String, String>,
    /// Caller-chosen id; redelivery with an already tracked id is a no-op
    #[serde(default)]
    pub request_id: Option<String>,
    /// Explicit destination; derived from the submission prefix when absent
    #[serde(default)]
    pub destination_locator: Option<String>,
}

impl WorkItem {
    pub fn new(source_locator: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            source_locator: source_locator.into(),
            created_at,
            raw_metadata: HashMap::new(),
            request_id: None,
            destination_locator: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.raw_metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_destination(mut self, destination_locator: impl Into<String>) -> Self {
        self.destination_locator = Some(destination_locator.into());
        self
    }

    /// Caller-supplied request id, or a fresh time-ordered one
    pub fn resolve_request_id(&self) -> String {
        self.request_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::now_v7().to_string())
    }

    /// Explicit destination, or `{prefix}/{request_id}/{file name}`
    pub fn resolve_destination(&self, prefix: &str, request_id: &str) -> String {
        if let Some(destination) = self.destination_locator.as_ref().filter(|d| !d.is_empty()) {
            return destination.clone();
        }
        let file_name = self
            .source_locator
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("content");
        format!("{}/{}/{}", prefix.trim_end_matches('/'), request_id, file_name)
    }
}
