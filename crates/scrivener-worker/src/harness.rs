use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scrivener_config::Config;
use scrivener_errors::StageError;
use scrivener_messaging::publish_stage_event;
use scrivener_queue::{QueueBroker, QueueMessage};
use scrivener_status::{DocumentIndexStore, StatusStore};
use serde_json::Map;
use tokio::sync::Semaphore;

use crate::handler::StageHandler;
use crate::renewal::LockRenewal;

/// Cooperative stop flag for [`WorkerHarness::run`]. Triggering it lets the
/// current poll finish before the loop exits — there is no in-band cancel
/// for an in-flight handler (§5).
#[derive(Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One instance per queue (§4.6): a receive→decode→dispatch loop with
/// lock-renewal registered before dispatch, bounded concurrency, and
/// `Err`-dispatch on [`StageError::is_terminal`] — retryable failures are
/// abandoned for redelivery, terminal ones are completed so a failure
/// that can never succeed on retry doesn't loop forever. The broker
/// already hands back a decoded
/// [`scrivener_types::JobPayload`], so there is no separate parse step to
/// fail here — a structurally invalid message is the broker's concern.
pub struct WorkerHarness {
    broker: Arc<dyn QueueBroker>,
    status_store: Arc<dyn StatusStore>,
    document_index: Arc<dyn DocumentIndexStore>,
    config: Arc<Config>,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerHarness {
    #[must_use]
    pub fn new(
        broker: Arc<dyn QueueBroker>,
        status_store: Arc<dyn StatusStore>,
        document_index: Arc<dyn DocumentIndexStore>,
        config: Arc<Config>,
    ) -> Self {
        let concurrency = config.queue_pool_size.max(1) as usize;
        Self {
            broker,
            status_store,
            document_index,
            config,
            concurrency,
            poll_interval: Duration::from_millis(500),
        }
    }

    /// Override the idle-poll interval used when a receive comes back
    /// empty (tests want this short; a real broker's own long-poll makes
    /// it close to a no-op in production).
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Receive and fully process one batch (up to 10 messages) for
    /// `handler`'s queue. Returns the number of messages dispatched.
    pub async fn run_once(&self, handler: Arc<dyn StageHandler>) -> Result<usize, StageError> {
        let visibility_timeout = Duration::from_secs(self.config.lock_renewal_secs);
        let messages = self.broker.receive(handler.queue(), 10, visibility_timeout).await?;
        if messages.is_empty() {
            return Ok(0);
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(messages.len());
        for message in messages {
            let semaphore = semaphore.clone();
            let broker = self.broker.clone();
            let status_store = self.status_store.clone();
            let document_index = self.document_index.clone();
            let config = self.config.clone();
            let handler = handler.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                process_one(broker, status_store, document_index, config, handler, message).await;
            }));
        }
        let processed = tasks.len();
        for task in tasks {
            let _ = task.await;
        }
        Ok(processed)
    }

    /// Run the main loop until `shutdown` is triggered.
    pub async fn run(&self, handler: Arc<dyn StageHandler>, shutdown: ShutdownSignal) {
        while !shutdown.is_triggered() {
            match self.run_once(handler.clone()).await {
                Ok(0) => tokio::time::sleep(self.poll_interval).await,
                Ok(_) => {}
                Err(error) => {
                    tracing::error!(queue = ?handler.queue(), %error, "receive failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

async fn process_one(
    broker: Arc<dyn QueueBroker>,
    status_store: Arc<dyn StatusStore>,
    document_index: Arc<dyn DocumentIndexStore>,
    config: Arc<Config>,
    handler: Arc<dyn StageHandler>,
    message: QueueMessage,
) {
    if let Err(error) = publish_stage_event(
        broker.as_ref(),
        status_store.as_ref(),
        document_index.as_ref(),
        &config,
        handler.stage_prefix(),
        "START",
        &message.payload,
        Map::new(),
    )
    .await
    {
        tracing::warn!(job_id = %message.payload.job_id, %error, "failed to publish START status");
    }

    let visibility_timeout = Duration::from_secs(config.lock_renewal_secs);
    let renew_interval = Duration::from_secs(60);
    let renewal = LockRenewal::register(broker.clone(), message.clone(), visibility_timeout, renew_interval);

    let result = handler.handle(message.payload.clone()).await;
    renewal.stop().await;

    match result {
        Ok(()) => {
            if let Err(error) = broker.complete(&message).await {
                tracing::error!(job_id = %message.payload.job_id, queue = ?message.queue, %error, "failed to complete message");
            }
        }
        Err(error) => {
            tracing::error!(
                job_id = %message.payload.job_id,
                queue = ?message.queue,
                delivery_count = message.delivery_count,
                retryable = error.is_retryable(),
                terminal = error.is_terminal(),
                %error,
                "stage handler failed"
            );
            if error.is_terminal() {
                // Redelivery can't fix a semantic/missing-context failure — the
                // payload and stored artifacts are identical next time. Complete
                // the message so the job halts here instead of looping forever;
                // an operator has to intervene on the underlying data.
                if let Err(complete_error) = broker.complete(&message).await {
                    tracing::error!(job_id = %message.payload.job_id, %complete_error, "failed to complete terminal message");
                }
            } else if let Err(abandon_error) = broker.abandon(&message).await {
                tracing::error!(job_id = %message.payload.job_id, %abandon_error, "failed to abandon message");
            }
        }
    }
}
