//! # Messaging
//!
//! Outbound message bus abstraction and its adapters. The tracker only
//! publishes; consumers subscribe through whatever the adapter exposes.

pub mod broadcast;
pub mod envelope;
pub mod pg_notify;

use async_trait::async_trait;

use crate::errors::PublishError;

pub use broadcast::{BroadcastBus, PublishedMessage};
pub use envelope::{EventCategory, EventEnvelope};
pub use pg_notify::PgNotifyBus;

pub type PublishResult<T> = Result<T, PublishError>;

#[async_trait]
pub trait MessageBus: Send + Sync + std::fmt::Debug {
    /// Publish one envelope to `topic`. Delivery is at-least-once at best;
    /// callers must tolerate duplicates downstream.
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> PublishResult<()>;
}
