use std::sync::Arc;
use std::time::Duration;

use scrivener_queue::{QueueBroker, QueueMessage};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// A background lock-renewal registration for one in-flight message.
/// Dropping (or calling [`LockRenewal::stop`]) signals the renewal task to
/// exit and awaits it, so a handler's teardown never outlives its lease.
pub struct LockRenewal {
    stop: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl LockRenewal {
    /// Register renewal for `message`: every `interval`, extend its lock
    /// by `visibility_timeout`. Renewal failures are logged and retried on
    /// the next tick rather than aborting the handler.
    pub fn register(broker: Arc<dyn QueueBroker>, message: QueueMessage, visibility_timeout: Duration, interval: Duration) -> Self {
        let stop = Arc::new(Notify::new());
        let task_stop = stop.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Err(error) = broker.renew_lock(&message, visibility_timeout).await {
                            tracing::warn!(job_id = %message.payload.job_id, queue = ?message.queue, %error, "lock renewal failed");
                        }
                    }
                    _ = task_stop.notified() => break,
                }
            }
        });
        Self { stop, task: Some(task) }
    }

    /// Signal the renewal task to stop and wait for it to finish.
    pub async fn stop(mut self) {
        self.stop.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LockRenewal {
    fn drop(&mut self) {
        self.stop.notify_one();
    }
}
