//! # Tracker Configuration
//!
//! Typed configuration for the lifecycle tracker. Values are layered by
//! [`ConfigManager`]: built-in defaults, then an optional TOML file, then
//! `TRACKER__SECTION__KEY` environment overrides.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lifecycle_tracker::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let poller = &manager.config().poller;
//! println!("polling every {:?}", poller.poll_interval());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/tracker.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Reconciliation loop settings
    pub poller: PollerConfig,

    /// Submission settings
    pub submission: SubmissionConfig,

    /// Outbound notification topics
    pub notifications: NotificationConfig,

    /// Raw external status vocabulary
    pub vocabulary: VocabularyConfig,

    /// External processor endpoint
    pub processor: ProcessorConfig,

    /// Tracking store database
    pub database: DatabaseConfig,
}

impl TrackerConfig {
    /// Validate cross-field constraints after loading
    pub fn validate(&self) -> ConfigResult<()> {
        self.poller.validate()?;
        self.submission.validate()?;
        self.notifications.validate()?;
        self.vocabulary.validate()?;
        self.processor.validate()?;
        Ok(())
    }
}

/// Reconciliation loop configuration
///
/// Durations are expressed in seconds so they can be overridden from the
/// environment without a duration parser.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    pub enabled: bool,
    pub poll_interval_seconds: u64,
    /// Records older than this (measured from submission) are timed out
    pub max_age_seconds: u64,
    /// Status checks allowed before a record is forced to Failed
    pub max_check_count: u32,
    pub status_call_timeout_seconds: u64,
    /// Records examined per cycle; the rest wait for the next cycle
    pub batch_size: usize,
    pub max_concurrent_checks: usize,
    /// Pending count above which the backlog is reported as unhealthy
    pub backlog_warning_threshold: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_seconds: 300,
            max_age_seconds: 24 * 60 * 60,
            max_check_count: 288,
            status_call_timeout_seconds: 30,
            batch_size: 500,
            max_concurrent_checks: 16,
            backlog_warning_threshold: 1000,
        }
    }
}

impl PollerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    pub fn status_call_timeout(&self) -> Duration {
        Duration::from_secs(self.status_call_timeout_seconds)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.poll_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "poller.poll_interval_seconds",
                self.poll_interval_seconds,
                "must be greater than zero",
            ));
        }
        if self.max_age_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "poller.max_age_seconds",
                self.max_age_seconds,
                "must be greater than zero",
            ));
        }
        if self.max_check_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "poller.max_check_count",
                self.max_check_count,
                "must be greater than zero",
            ));
        }
        if self.status_call_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "poller.status_call_timeout_seconds",
                self.status_call_timeout_seconds,
                "must be greater than zero",
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "poller.batch_size",
                self.batch_size,
                "must be greater than zero",
            ));
        }
        if self.max_concurrent_checks == 0 {
            return Err(ConfigurationError::invalid_value(
                "poller.max_concurrent_checks",
                self.max_concurrent_checks,
                "must be greater than zero",
            ));
        }
        if self.status_call_timeout_seconds > self.poll_interval_seconds {
            return Err(ConfigurationError::invalid_value(
                "poller.status_call_timeout_seconds",
                self.status_call_timeout_seconds,
                "must not exceed poller.poll_interval_seconds",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Prefix for derived destination locators
    pub destination_prefix: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            destination_prefix: "processing".to_string(),
        }
    }
}

impl SubmissionConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.destination_prefix.trim_matches('/').is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "destination_prefix",
                "submission",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Topic for request status updates (submitted / completed / failed / timed out)
    pub status_topic: String,
    /// Topic for generic notifications (rejections, backlog warnings)
    pub notification_topic: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            status_topic: "tracker_status_updates".to_string(),
            notification_topic: "tracker_notifications".to_string(),
        }
    }
}

impl NotificationConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.status_topic.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "status_topic",
                "notifications",
            ));
        }
        if self.notification_topic.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "notification_topic",
                "notifications",
            ));
        }
        Ok(())
    }
}

/// Raw status strings reported by the external processor, grouped by meaning.
///
/// Matching is case-insensitive. Strings outside every group map to
/// `ExternalStatus::Unknown`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    pub in_progress: Vec<String>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| (*s).to_string()).collect();
        Self {
            completed: words(&["completed", "complete", "success", "succeeded"]),
            failed: words(&["failed", "failure", "error", "cancelled", "canceled"]),
            in_progress: words(&[
                "processing",
                "in_progress",
                "pending",
                "queued",
                "running",
                "submitted",
            ]),
        }
    }
}

impl VocabularyConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.completed.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "completed",
                "vocabulary",
            ));
        }
        if self.failed.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "failed",
                "vocabulary",
            ));
        }
        for word in &self.completed {
            let normalized = word.trim().to_lowercase();
            if self
                .failed
                .iter()
                .any(|f| f.trim().to_lowercase() == normalized)
            {
                return Err(ConfigurationError::invalid_value(
                    "vocabulary",
                    word,
                    "status listed as both completed and failed",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub base_url: String,
    pub request_timeout_seconds: u64,
    /// Bearer token sent with every request, if set
    pub api_token: Option<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout_seconds: 30,
            api_token: None,
        }
    }
}

impl ProcessorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigurationError::invalid_value(
                "processor.base_url",
                &self.base_url,
                "must be an http(s) URL",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    /// Run embedded migrations on startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// Database URL from config, falling back to `DATABASE_URL`
    pub fn database_url(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
    }
}
