use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scrivener_errors::StageError;
use scrivener_types::{JobPayload, QueueName, StatusEvent};
use uuid::Uuid;

use crate::{QueueBroker, QueueMessage};

struct Entry {
    lock_id: String,
    payload: JobPayload,
    delivery_count: u32,
    locked_until: Option<Instant>,
}

/// In-process broker backed by per-queue `VecDeque`s, used by unit and
/// integration tests to drive the full state machine without a real
/// broker. Visibility locks are tracked with `Instant` deadlines rather
/// than a background expiry sweep; a lock is treated as expired the next
/// time `receive` scans past it.
#[derive(Default)]
pub struct InMemoryQueueBroker {
    queues: Mutex<HashMap<QueueName, VecDeque<Entry>>>,
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl InMemoryQueueBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every status event published so far, in publish order,
    /// keyed by the topic it landed on. Test-only introspection.
    #[must_use]
    pub fn published_events(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().expect("poisoned").clone()
    }

    /// Depth of `queue`, including currently-locked messages. Test-only
    /// introspection for asserting re-enqueue/terminal behavior.
    #[must_use]
    pub fn queue_len(&self, queue: QueueName) -> usize {
        self.queues
            .lock()
            .expect("poisoned")
            .get(&queue)
            .map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl QueueBroker for InMemoryQueueBroker {
    async fn send(&self, queue: QueueName, payload: JobPayload) -> Result<(), StageError> {
        self.queues.lock().expect("poisoned").entry(queue).or_default().push_back(Entry {
            lock_id: Uuid::new_v4().to_string(),
            payload,
            delivery_count: 0,
            locked_until: None,
        });
        Ok(())
    }

    async fn receive(
        &self,
        queue: QueueName,
        max: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, StageError> {
        let now = Instant::now();
        let mut queues = self.queues.lock().expect("poisoned");
        let entries = queues.entry(queue).or_default();

        let mut out = Vec::new();
        for entry in entries.iter_mut() {
            if out.len() >= max {
                break;
            }
            let available = match entry.locked_until {
                Some(until) => until <= now,
                None => true,
            };
            if !available {
                continue;
            }
            entry.locked_until = Some(now + visibility_timeout);
            entry.delivery_count += 1;
            out.push(QueueMessage {
                lock_id: entry.lock_id.clone(),
                queue,
                payload: entry.payload.clone(),
                delivery_count: entry.delivery_count,
            });
        }
        Ok(out)
    }

    async fn complete(&self, message: &QueueMessage) -> Result<(), StageError> {
        let mut queues = self.queues.lock().expect("poisoned");
        if let Some(entries) = queues.get_mut(&message.queue) {
            entries.retain(|e| e.lock_id != message.lock_id);
        }
        Ok(())
    }

    async fn abandon(&self, message: &QueueMessage) -> Result<(), StageError> {
        let mut queues = self.queues.lock().expect("poisoned");
        if let Some(entries) = queues.get_mut(&message.queue) {
            if let Some(entry) = entries.iter_mut().find(|e| e.lock_id == message.lock_id) {
                entry.locked_until = None;
            }
        }
        Ok(())
    }

    async fn renew_lock(&self, message: &QueueMessage, visibility_timeout: Duration) -> Result<(), StageError> {
        let mut queues = self.queues.lock().expect("poisoned");
        if let Some(entries) = queues.get_mut(&message.queue) {
            if let Some(entry) = entries.iter_mut().find(|e| e.lock_id == message.lock_id) {
                entry.locked_until = Some(Instant::now() + visibility_timeout);
            }
        }
        Ok(())
    }

    async fn publish_to_topic(&self, topic: &str, event: &StatusEvent) -> Result<(), StageError> {
        self.published
            .lock()
            .expect("poisoned")
            .push((topic.to_string(), serde_json::Value::Object(event.to_payload())));
        Ok(())
    }
}
