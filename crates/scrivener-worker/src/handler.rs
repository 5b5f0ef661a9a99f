use async_trait::async_trait;
use scrivener_errors::StageError;
use scrivener_types::{JobPayload, QueueName};

/// One stage's processing logic, dispatched by the [`crate::WorkerHarness`]
/// loop for its queue. Implementors own their own re-enqueue and status
/// publication beyond the generic `START` event the harness emits.
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// The queue this handler consumes.
    fn queue(&self) -> QueueName;

    /// The `{prefix}` half of this stage's status events, e.g. `"WRITE"`
    /// or `"REVIEW_GENERAL"`, used for the harness's own `START` event.
    fn stage_prefix(&self) -> &'static str;

    /// Process one message's payload. A `Transient` or other retryable
    /// error causes the harness to abandon the message for redelivery; a
    /// terminal error (`is_terminal`, e.g. `Semantic` or `MissingContext`)
    /// instead completes the message — redelivery can't change the
    /// outcome, so the job halts here instead of looping forever.
    async fn handle(&self, payload: JobPayload) -> Result<(), StageError>;
}
