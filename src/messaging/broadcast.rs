//! In-process message bus.
//!
//! Fans every published envelope out to all current subscribers. Useful for
//! tests and for embedding the tracker in a process that consumes its own
//! notifications.
//!
//! ```rust
//! use chrono::Utc;
//! use lifecycle_tracker::messaging::{BroadcastBus, EventEnvelope, MessageBus};
//!
//! # tokio_test::block_on(async {
//! let bus = BroadcastBus::default();
//! let mut receiver = bus.subscribe();
//!
//! let envelope = EventEnvelope::new("submitted", Utc::now(), "req-1 submitted", serde_json::json!({}));
//! bus.publish("tracker_status_updates", &envelope).await.unwrap();
//!
//! let message = receiver.recv().await.unwrap();
//! assert_eq!(message.topic, "tracker_status_updates");
//! assert_eq!(message.envelope.event_type, "submitted");
//! # });
//! ```

use tokio::sync::broadcast;

use super::{EventEnvelope, MessageBus, PublishResult};

/// Envelope together with the topic it was published on
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub envelope: EventEnvelope,
}

/// In-process bus over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    sender: broadcast::Sender<PublishedMessage>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait::async_trait]
impl MessageBus for BroadcastBus {
    async fn publish(&self, topic: &str, envelope: &EventEnvelope) -> PublishResult<()> {
        let message = PublishedMessage {
            topic: topic.to_string(),
            envelope: envelope.clone(),
        };

        // send() only fails when nobody is subscribed, which is not a publish failure
        let _ = self.sender.send(message);
        Ok(())
    }
}
