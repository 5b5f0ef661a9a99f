//! Messaging facade: `send_queue` and `publish_status`, normalizing stage
//! labels and default messages so stage processors never build a
//! `StatusEvent` by hand.

use std::time::{SystemTime, UNIX_EPOCH};

use scrivener_config::Config;
use scrivener_errors::StageError;
use scrivener_queue::QueueBroker;
use scrivener_status::{DocumentIndexStore, StatusStore};
use scrivener_types::{JobPayload, QueueName, StatusEvent};
use serde_json::{Map, Value};

/// Stages whose status events carry a `cycle` number. Matches the source
/// pipeline's set exactly: every other stage's `cycle` field stays `None`.
const CYCLIC_STAGE_PREFIXES: [&str; 3] = ["REVIEW", "VERIFY", "REWRITE"];

/// Extra keys a caller is allowed to attach to a `publish_stage_event`
/// status; anything else is dropped rather than silently leaking internal
/// payload fields onto the public status topic.
const ALLOWED_EXTRA_KEYS: [&str; 6] = [
    "artifact",
    "message",
    "has_contradictions",
    "style_issues",
    "cohesion_issues",
    "placeholder_sections",
];

fn now_ts() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

fn current_cycle(stage_prefix: &str, payload: &JobPayload) -> Option<i64> {
    if CYCLIC_STAGE_PREFIXES.contains(&stage_prefix) {
        Some(payload.cycles_completed.unwrap_or(0) + 1)
    } else {
        None
    }
}

/// Enqueue `payload` onto `queue`. A thin pass-through kept on the facade
/// so stage processors depend on one messaging surface for both queue
/// sends and status publication, matching the source pipeline's
/// `send_queue_message` / `publish_status` pairing.
pub async fn send_queue(broker: &dyn QueueBroker, queue: QueueName, payload: JobPayload) -> Result<(), StageError> {
    broker.send(queue, payload).await
}

/// Build and publish a status event for `"{stage_prefix}_{event}"`
/// (e.g. `publish_stage_event(.., "WRITE", "DONE", ..)` → `WRITE_DONE`),
/// attaching a cycle number for the cyclic stages and filtering `extra`
/// down to the allowed status keys.
pub async fn publish_stage_event(
    broker: &dyn QueueBroker,
    status_store: &dyn StatusStore,
    document_index: &dyn DocumentIndexStore,
    config: &Config,
    stage_prefix: &str,
    event: &str,
    payload: &JobPayload,
    extra: Map<String, Value>,
) -> Result<(), StageError> {
    if payload.job_id.is_empty() {
        return Ok(());
    }
    let stage = format!("{stage_prefix}_{event}");
    let cycle = current_cycle(stage_prefix, payload);

    let mut filtered = Map::new();
    for key in ALLOWED_EXTRA_KEYS {
        if let Some(value) = extra.get(key) {
            filtered.insert(key.to_string(), value.clone());
        }
    }
    let message = filtered
        .get("message")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| StatusEvent::default_message(&stage, cycle));
    filtered.remove("message");

    let event = StatusEvent {
        job_id: payload.job_id.clone(),
        stage,
        ts: now_ts(),
        message,
        artifact: filtered.remove("artifact").and_then(|v| v.as_str().map(str::to_string)),
        cycle,
        has_contradictions: filtered.remove("has_contradictions").and_then(|v| v.as_bool()),
        style_issues: filtered.remove("style_issues").and_then(|v| v.as_bool()),
        cohesion_issues: filtered.remove("cohesion_issues").and_then(|v| v.as_bool()),
        placeholder_sections: filtered.remove("placeholder_sections").and_then(|v| v.as_bool()),
        extra: Map::new(),
    };

    publish_status(broker, status_store, config, &event).await?;
    mirror_to_document_index(document_index, payload, &event).await
}

/// Publish an already-built status event to the configured topics,
/// trying each in order and stopping at the first success, and record it
/// into the durable status table. In the source pipeline the table is
/// populated by a separate consumer of the status fan-out topic; here the
/// two happen inline since there is no separate topic-consumer process.
pub async fn publish_status(
    broker: &dyn QueueBroker,
    status_store: &dyn StatusStore,
    config: &Config,
    event: &StatusEvent,
) -> Result<(), StageError> {
    status_store.record(event.to_payload()).await?;
    broker.publish_status(&config.status_topics(), event).await
}

/// Mirror a status event into the per-user document index (§4.3), keyed
/// by `(user_id, job_id)`. A payload with no `user_id` has nothing to
/// mirror into — the document index only exists to let a user list their
/// own jobs.
async fn mirror_to_document_index(
    document_index: &dyn DocumentIndexStore,
    payload: &JobPayload,
    event: &StatusEvent,
) -> Result<(), StageError> {
    if payload.user_id.is_empty() {
        return Ok(());
    }
    let mut fields = Map::new();
    if let Some(title) = &payload.title {
        fields.insert("title".to_string(), Value::String(title.clone()));
    }
    if let Some(audience) = &payload.audience {
        fields.insert("audience".to_string(), Value::String(audience.clone()));
    }
    fields.insert("stage".to_string(), Value::String(event.stage.clone()));
    fields.insert("message".to_string(), Value::String(event.message.clone()));
    if let Some(artifact) = &event.artifact {
        fields.insert("artifact".to_string(), Value::String(artifact.clone()));
    }
    fields.insert("updated".to_string(), Value::from(event.ts));
    if let Some(cycles) = payload.cycles {
        fields.insert("cycles_requested".to_string(), Value::from(cycles));
    }
    if let Some(completed) = payload.cycles_completed {
        fields.insert("cycles_completed".to_string(), Value::from(completed));
    }
    let is_failure = event.stage.ends_with("_FAILED");
    fields.insert("has_error".to_string(), Value::Bool(is_failure));
    if is_failure {
        fields.insert("last_error".to_string(), Value::String(event.message.clone()));
    }
    document_index.upsert(&payload.user_id, &payload.job_id, fields).await
}
