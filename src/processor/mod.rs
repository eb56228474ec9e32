//! # External Processor
//!
//! Client seam for the service that does the actual work. The tracker only
//! needs two calls: submit a work item, and ask for its status by the key the
//! processor handed back.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::ProcessorError;
use crate::models::ProcessingResult;

pub use http::HttpProcessorClient;

pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// What the processor is told about a submitted work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemDescription {
    pub request_id: String,
    pub source_locator: String,
    pub destination_locator: String,
    /// Version tag of the transferred destination object
    pub content_version: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Processor's answer to a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default = "accepted_by_default")]
    pub accepted: bool,
    #[serde(default)]
    pub external_key: Option<String>,
    #[serde(default)]
    pub initial_status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn accepted_by_default() -> bool {
    true
}

impl SubmitResponse {
    pub fn accepted(external_key: impl Into<String>) -> Self {
        Self {
            accepted: true,
            external_key: Some(external_key.into()),
            initial_status: None,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            external_key: None,
            initial_status: None,
            message: Some(message.into()),
        }
    }

    /// Non-blank external key, if any
    pub fn usable_key(&self) -> Option<&str> {
        self.external_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Processor's answer to a status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Raw status word, classified through the status vocabulary
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<ProcessingResult>,
}

impl StatusReport {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: None,
            result: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_result(mut self, result: ProcessingResult) -> Self {
        self.result = Some(result);
        self
    }
}

#[async_trait]
pub trait ExternalProcessor: Send + Sync + std::fmt::Debug {
    /// Hand a work item to the processor. A refusal is an `Ok` response
    /// with `accepted == false`; `Err` means the call itself failed.
    async fn submit(&self, description: &WorkItemDescription) -> ProcessorResult<SubmitResponse>;

    async fn get_status(&self, external_key: &str) -> ProcessorResult<StatusReport>;
}
