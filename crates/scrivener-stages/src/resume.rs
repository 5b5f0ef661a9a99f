use scrivener_errors::StageError;
use scrivener_messaging::send_queue;
use scrivener_queue::QueueBroker;
use scrivener_types::{JobPayload, QueueName};

/// Post a bare `intake_resume` message for a job whose intake questions
/// have been answered (§4.7.1 "Successor: none — the caller must invoke
/// `send_resume`"). The `intake_resume` stage reloads everything it
/// needs from `intake/context.json` and the status table, so this only
/// needs the two ids.
pub async fn send_resume(broker: &dyn QueueBroker, job_id: &str, user_id: &str) -> Result<(), StageError> {
    send_queue(broker, QueueName::IntakeResume, JobPayload::new(job_id, user_id)).await
}
