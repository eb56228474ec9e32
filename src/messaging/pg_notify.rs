//! # PostgreSQL NOTIFY Bus
//!
//! Publishes each envelope as the JSON payload of `pg_notify(topic, payload)`.
//! Consumers `LISTEN` on the topic name. Payloads above
//! [`DEFAULT_MAX_PAYLOAD_SIZE`] are refused rather than truncated, since
//! PostgreSQL caps NOTIFY payloads just under 8000 bytes.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{EventEnvelope, MessageBus, PublishResult};
use crate::errors::PublishError;

pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 7800;
/// PostgreSQL identifier length limit
const MAX_CHANNEL_LENGTH: usize = 63;

#[derive(Debug, Clone)]
pub struct PgNotifyBus {
    pool: PgPool,
    max_payload_size: usize,
}

impl PgNotifyBus {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    pub fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size.min(DEFAULT_MAX_PAYLOAD_SIZE);
        self
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    fn encode(&self, topic: &str, envelope: &EventEnvelope) -> PublishResult<String> {
        if topic.is_empty() || topic.len() > MAX_CHANNEL_LENGTH {
            return Err(PublishError::Transport {
                topic: topic.to_string(),
                reason: format!("channel name must be 1..={MAX_CHANNEL_LENGTH} bytes"),
            });
        }

        let payload = envelope.to_json()?;
        if payload.len() > self.max_payload_size {
            return Err(PublishError::Transport {
                topic: topic.to_string(),
                reason: format!(
                    "payload of {} bytes exceeds limit of {}",
                    payload.len(),
                    self.max_payload_size
                ),
            });
        }
        Ok(payload)
    }
}

#[async_trait]
impl MessageBus for PgNotifyBus {
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> PublishResult<()> {
        let payload = self.encode(topic, envelope)?;

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(topic)
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(|e| PublishError::Transport {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            topic = %topic,
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            "Published envelope via pg_notify"
        );
        Ok(())
    }
}
