use scrivener_types::{CycleState, JobPayload};
use serde_json::{Map, Value};

use crate::StatusStore;

const CYCLE_FIELDS: [&str; 4] = ["cycles", "expected_cycles", "cycles_completed", "cycles_remaining"];

/// True if `target[field]` is missing or holds a value the source pipeline
/// treats as "not really set" (`null`, empty string, empty array) — the
/// same "only fill in blanks" rule `_merge_cycles` applies so a status row
/// never clobbers cycle data a later, more specific source already supplied.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        _ => false,
    }
}

/// Copy cycle fields present in `source` into `target` wherever `target`
/// is currently blank. Returns whether anything changed.
fn merge_cycle_fields(target: &mut Map<String, Value>, source: &Map<String, Value>) -> bool {
    let mut updated = false;
    for field in CYCLE_FIELDS {
        let Some(value) = source.get(field) else { continue };
        if value.is_null() {
            continue;
        }
        if is_blank(target.get(field)) {
            target.insert(field.to_string(), value.clone());
            updated = true;
        }
    }
    updated
}

/// A status row can carry cycle fields directly, nested under `details`,
/// or doubly nested under `details.parsed_message` (a status row that
/// itself echoes a job payload). Collect every map-shaped candidate.
fn cycle_sources(entity: &Map<String, Value>) -> Vec<Map<String, Value>> {
    let mut sources = Vec::new();
    if let Some(Value::Object(details)) = entity.get("details") {
        sources.push(details.clone());
        if let Some(Value::Object(parsed)) = details.get("parsed_message") {
            sources.push(parsed.clone());
        }
    } else if let Some(Value::String(raw)) = entity.get("details") {
        if let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(raw) {
            sources.push(parsed);
        }
    }
    sources
}

fn ingest(target: &mut Map<String, Value>, entity: &Map<String, Value>) -> bool {
    let mut populated = merge_cycle_fields(target, entity);
    for source in cycle_sources(entity) {
        if merge_cycle_fields(target, &source) {
            populated = true;
        }
    }
    populated
}

/// Fill in any missing cycle field on `target` by consulting the status
/// store: first the job's latest row, then (if still unpopulated) its
/// timeline in reverse-chronological order. Returns whether anything was
/// populated.
pub async fn hydrate_cycle_metadata(
    target: &mut Map<String, Value>,
    job_id: &str,
    store: &dyn StatusStore,
) -> bool {
    if job_id.is_empty() {
        return false;
    }

    if let Ok(Some(latest)) = store.latest(job_id).await {
        if ingest(target, &latest) {
            return true;
        }
    }

    let Ok(history) = store.timeline(job_id).await else {
        return false;
    };
    for entity in history.iter().rev() {
        if ingest(target, entity) {
            return true;
        }
    }
    false
}

/// Hydrate cycle metadata on a raw job payload map, then derive and
/// reapply its [`CycleState`] so every cycle field is consistent before
/// the stage reads it.
pub async fn ensure_cycle_state(payload: &mut Map<String, Value>, store: &dyn StatusStore) -> CycleState {
    if let Some(job_id) = payload.get("job_id").and_then(Value::as_str).map(str::to_string) {
        hydrate_cycle_metadata(payload, &job_id, store).await;
    }
    let cycle_state = CycleState::from_context(payload);
    cycle_state.apply(payload);
    cycle_state
}

/// Convenience wrapper for callers holding a typed [`JobPayload`] rather
/// than a raw map: round-trips through JSON so the same hydration logic
/// applies uniformly, then rebuilds the typed payload.
pub async fn ensure_cycle_state_typed(payload: &mut JobPayload, store: &dyn StatusStore) -> CycleState {
    let mut map = match serde_json::to_value(&*payload) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let cycle_state = ensure_cycle_state(&mut map, store).await;
    if let Ok(rebuilt) = serde_json::from_value(Value::Object(map)) {
        *payload = rebuilt;
    }
    cycle_state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStatusStore;
    use serde_json::json;

    #[tokio::test]
    async fn hydrates_cycle_fields_from_latest_status_row() {
        let store = InMemoryStatusStore::new();
        store
            .record(
                json!({
                    "job_id": "job-1",
                    "stage": "WRITE_DONE",
                    "ts": 1.0,
                    "details": { "cycles": 3, "cycles_completed": 1 },
                })
                .as_object()
                .unwrap()
                .clone(),
            )
            .await
            .unwrap();

        let mut payload = json!({ "job_id": "job-1" }).as_object().unwrap().clone();
        let state = ensure_cycle_state(&mut payload, &store).await;
        assert_eq!(state.requested, 3);
        assert_eq!(state.completed, 1);
        assert_eq!(payload.get("cycles").unwrap(), 3);
    }

    #[tokio::test]
    async fn existing_payload_fields_are_not_overwritten_by_hydration() {
        let store = InMemoryStatusStore::new();
        store
            .record(
                json!({ "job_id": "job-1", "stage": "WRITE_DONE", "ts": 1.0, "cycles": 9 })
                    .as_object()
                    .unwrap()
                    .clone(),
            )
            .await
            .unwrap();

        let mut payload = json!({ "job_id": "job-1", "cycles": 2 }).as_object().unwrap().clone();
        let state = ensure_cycle_state(&mut payload, &store).await;
        assert_eq!(state.requested, 2, "payload's own cycles field wins over hydration");
    }

    #[tokio::test]
    async fn falls_back_to_timeline_when_latest_row_has_nothing_useful() {
        let store = InMemoryStatusStore::new();
        store
            .record(
                json!({ "job_id": "job-1", "stage": "PLAN_INTAKE_STARTED", "ts": 1.0, "details": { "cycles": 4 } })
                    .as_object()
                    .unwrap()
                    .clone(),
            )
            .await
            .unwrap();
        store
            .record(json!({ "job_id": "job-1", "stage": "PLAN_DONE", "ts": 2.0 }).as_object().unwrap().clone())
            .await
            .unwrap();

        let mut payload = json!({ "job_id": "job-1" }).as_object().unwrap().clone();
        let state = ensure_cycle_state(&mut payload, &store).await;
        assert_eq!(state.requested, 4);
    }
}
