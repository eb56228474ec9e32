//! # Structured Logging
//!
//! One-time `tracing` subscriber setup. Console output is ANSI-coloured on a
//! TTY and JSON in production. The level comes from `LOG_LEVEL` or
//! `RUST_LOG` when set, otherwise from the environment name
//! (`TRACKER_ENV`, then `APP_ENV`).

use chrono::Utc;
use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::metrics;

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber and create metric instruments.
///
/// Safe to call more than once; only the first call has an effect, and an
/// already-installed subscriber from the host process is left in place.
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let use_ansi = std::io::stdout().is_terminal();

        let console_layer = if environment == "production" {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(use_ansi)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(console_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(
                environment = %environment,
                log_level = %log_level,
                ansi_colors = use_ansi,
                "Logging initialized"
            );
        }

        metrics::init();
    });
}

/// Current environment name
pub fn get_environment() -> String {
    std::env::var("TRACKER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        return level.to_lowercase();
    }
    if let Ok(level) = std::env::var("RUST_LOG") {
        return level;
    }

    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Lifecycle log line with the standard record fields
pub fn log_lifecycle_event(
    operation: &str,
    request_id: &str,
    internal_key: Option<&str>,
    status: &str,
    check_count: Option<u32>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        request_id = %request_id,
        internal_key = internal_key,
        status = %status,
        check_count = check_count,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "LIFECYCLE_EVENT"
    );
}

pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        "ERROR: {} failed in {}: {}", operation, component, error
    );
}
