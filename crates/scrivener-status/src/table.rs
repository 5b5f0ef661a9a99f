use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use scrivener_errors::StageError;
use serde_json::{Map, Value};

/// Row key for a "latest" projection row: one per job, overwritten on
/// every status event.
pub const LATEST_ROW_KEY: &str = "latest";

/// Row key for a timeline history row: `<ts microseconds, 20-digit
/// zero-padded>_<stage>`, sortable lexicographically in chronological
/// order.
#[must_use]
pub fn history_row_key(ts: f64, stage: Option<&str>) -> String {
    let stage_label = stage.filter(|s| !s.is_empty()).unwrap_or("UNKNOWN").replace(' ', "_");
    let micros = (ts * 1_000_000.0) as i64;
    format!("{micros:020}_{stage_label}")
}

/// Durable per-job status table: one "latest" row plus an append-only
/// timeline of history rows.
///
/// Populated by whatever consumes the status fan-out topic; read by every
/// stage that needs to hydrate missing cycle context (§4.4) and by the
/// finalize stage to confirm prior completion.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Record a status event payload (job_id is required; everything
    /// else is opaque). Writes both the "latest" row and a new history
    /// row with the same content. A payload missing `job_id` is ignored.
    async fn record(&self, payload: Map<String, Value>) -> Result<(), StageError>;

    async fn latest(&self, job_id: &str) -> Result<Option<Map<String, Value>>, StageError>;

    /// Timeline rows in chronological order (oldest first).
    async fn timeline(&self, job_id: &str) -> Result<Vec<Map<String, Value>>, StageError>;
}

/// In-process status table, used by tests.
#[derive(Default)]
pub struct InMemoryStatusStore {
    rows: Mutex<BTreeMap<String, BTreeMap<String, Map<String, Value>>>>,
}

impl InMemoryStatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn record(&self, payload: Map<String, Value>) -> Result<(), StageError> {
        let Some(job_id) = payload.get("job_id").and_then(Value::as_str).map(str::to_string) else {
            return Ok(());
        };
        let ts = payload.get("ts").and_then(Value::as_f64).unwrap_or(0.0);
        let stage = payload.get("stage").and_then(Value::as_str);

        let mut rows = self.rows.lock().expect("poisoned");
        let job_rows = rows.entry(job_id).or_default();
        job_rows.insert(LATEST_ROW_KEY.to_string(), payload.clone());
        job_rows.insert(history_row_key(ts, stage), payload);
        Ok(())
    }

    async fn latest(&self, job_id: &str) -> Result<Option<Map<String, Value>>, StageError> {
        Ok(self
            .rows
            .lock()
            .expect("poisoned")
            .get(job_id)
            .and_then(|rows| rows.get(LATEST_ROW_KEY))
            .cloned())
    }

    async fn timeline(&self, job_id: &str) -> Result<Vec<Map<String, Value>>, StageError> {
        Ok(self
            .rows
            .lock()
            .expect("poisoned")
            .get(job_id)
            .map(|rows| {
                rows.iter()
                    .filter(|(key, _)| key.as_str() != LATEST_ROW_KEY)
                    .map(|(_, value)| value.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn record_without_job_id_is_silently_ignored() {
        let store = InMemoryStatusStore::new();
        store.record(json!({"stage": "WRITE_DONE"}).as_object().unwrap().clone()).await.unwrap();
        assert!(store.latest("job-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_reflects_most_recent_record_timeline_keeps_all() {
        let store = InMemoryStatusStore::new();
        store
            .record(json!({"job_id": "job-1", "stage": "WRITE_DONE", "ts": 1.0}).as_object().unwrap().clone())
            .await
            .unwrap();
        store
            .record(json!({"job_id": "job-1", "stage": "REVIEW_DONE", "ts": 2.0}).as_object().unwrap().clone())
            .await
            .unwrap();

        let latest = store.latest("job-1").await.unwrap().unwrap();
        assert_eq!(latest.get("stage").unwrap(), "REVIEW_DONE");

        let timeline = store.timeline("job-1").await.unwrap();
        assert_eq!(timeline.len(), 2);
    }
}
