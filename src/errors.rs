//! Error types for the lifecycle tracker.
//!
//! Each collaborator boundary has its own `thiserror` enum so callers can match
//! on the failure class; [`TrackerError`] wraps them for code that only needs to
//! propagate.

use crate::config::ConfigurationError;
use std::time::Duration;
use thiserror::Error;

/// Top-level error for tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),
    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),
    #[error("Content error: {0}")]
    Content(#[from] ContentError),
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

/// Failures of the tracking store backend.
///
/// Absence of a record is not an error; see [`crate::store::StoreLookup`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error during {operation}: {reason}")]
    Database { operation: String, reason: String },
    #[error("Corrupt record {request_id}: {reason}")]
    CorruptRecord { request_id: String, reason: String },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn database(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Database {
            operation: operation.into(),
            reason: err.to_string(),
        }
    }
}

/// Transient failures talking to the external processor
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessorError {
    #[error("Request to processor failed: {0}")]
    RequestFailed(String),
    #[error("Processor call {operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },
    #[error("Processor returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Unparseable processor response: {0}")]
    ResponseParse(String),
}

impl ProcessorError {
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }
}

/// Failures of a submission; no tracking record exists when one of these is returned
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Processor rejected work item {request_id}: {reason}")]
    Rejected { request_id: String, reason: String },
    #[error("Processor accepted work item {request_id} without an external key")]
    MissingExternalKey { request_id: String },
    #[error("Processor unreachable while submitting {request_id}: {source}")]
    Processor {
        request_id: String,
        #[source]
        source: ProcessorError,
    },
    #[error("Content transfer failed for {request_id}: {source}")]
    ContentTransfer {
        request_id: String,
        #[source]
        source: ContentError,
    },
    #[error("Tracking record for {request_id} could not be persisted: {source}")]
    Tracking {
        request_id: String,
        #[source]
        source: StoreError,
    },
    #[error("Invalid work item: {0}")]
    InvalidWorkItem(String),
}

impl SubmissionError {
    /// Request id the failure relates to, when one had been assigned
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Rejected { request_id, .. }
            | Self::MissingExternalKey { request_id }
            | Self::Processor { request_id, .. }
            | Self::ContentTransfer { request_id, .. }
            | Self::Tracking { request_id, .. } => Some(request_id),
            Self::InvalidWorkItem(_) => None,
        }
    }
}

/// Content-store failures
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Object not found: {locator}")]
    NotFound { locator: String },
    #[error("Invalid locator {locator}: {reason}")]
    InvalidLocator { locator: String, reason: String },
    #[error("I/O error on {locator}: {source}")]
    Io {
        locator: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Metadata error on {locator}: {reason}")]
    Metadata { locator: String, reason: String },
}

/// Message bus failures
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Message bus channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Publish to topic {topic} failed: {reason}")]
    Transport { topic: String, reason: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::database("query", err)
    }
}

impl From<reqwest::Error> for ProcessorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProcessorError::ResponseParse(err.to_string())
        } else {
            ProcessorError::RequestFailed(err.to_string())
        }
    }
}
