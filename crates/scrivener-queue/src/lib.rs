//! Queue broker abstraction: named point-to-point queues with
//! at-least-once delivery and visibility-timeout locks, plus a status
//! fan-out topic publisher.

mod in_memory;

pub use in_memory::InMemoryQueueBroker;

use std::time::Duration;

use async_trait::async_trait;
use scrivener_errors::StageError;
use scrivener_types::{JobPayload, QueueName, StatusEvent};

/// A message received from a queue: the decoded payload plus the handle
/// needed to `complete`, `abandon`, or renew its visibility lock.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub lock_id: String,
    pub queue: QueueName,
    pub payload: JobPayload,
    /// Number of times this message has been delivered, including this one.
    pub delivery_count: u32,
}

/// The queue broker: send, receive-with-lock, complete/abandon, lock
/// renewal, and status topic publication.
///
/// Mutual exclusion for a given job is the broker's responsibility: at
/// most one handler instance holds the lock for a given message at a
/// time, which is what lets the worker harness assume single-writer
/// semantics per job (§5 "Shared state").
#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Enqueue `payload` onto `queue`.
    async fn send(&self, queue: QueueName, payload: JobPayload) -> Result<(), StageError>;

    /// Receive up to `max` messages from `queue`, each locked for
    /// `visibility_timeout` from the moment it's returned.
    async fn receive(
        &self,
        queue: QueueName,
        max: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, StageError>;

    /// Acknowledge successful processing; the message will not be
    /// redelivered.
    async fn complete(&self, message: &QueueMessage) -> Result<(), StageError>;

    /// Release the lock early so the message becomes immediately
    /// available for redelivery (used on handler failure).
    async fn abandon(&self, message: &QueueMessage) -> Result<(), StageError>;

    /// Extend a message's visibility lock by `visibility_timeout` from
    /// now. Called periodically by the worker harness's lock-renewal
    /// task so a slow handler doesn't lose its lease mid-stage.
    async fn renew_lock(&self, message: &QueueMessage, visibility_timeout: Duration) -> Result<(), StageError>;

    /// Publish a status event to every topic in `topics`, in order,
    /// stopping at the first send that succeeds.
    async fn publish_status(&self, topics: &[String], event: &StatusEvent) -> Result<(), StageError> {
        let mut last_err = None;
        for topic in topics {
            match self.publish_to_topic(topic, event).await {
                Ok(()) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| StageError::Transient {
            operation: "publish_status".to_string(),
            reason: "no status topics configured".to_string(),
        }))
    }

    async fn publish_to_topic(&self, topic: &str, event: &StatusEvent) -> Result<(), StageError>;
}
