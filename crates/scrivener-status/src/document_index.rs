use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use scrivener_errors::StageError;
use serde_json::{Map, Value};

/// Per-user document listing, mirroring the status table so "list my
/// documents" never has to scan every job's status row.
#[async_trait]
pub trait DocumentIndexStore: Send + Sync {
    /// Merge `fields` into the `(user_id, job_id)` row, keeping any
    /// existing key `fields` doesn't mention and dropping (not writing)
    /// any key whose value is `null`.
    async fn upsert(&self, user_id: &str, job_id: &str, fields: Map<String, Value>) -> Result<(), StageError>;

    /// Every document row for `user_id`, most recently updated first.
    async fn list(&self, user_id: &str) -> Result<Vec<Map<String, Value>>, StageError>;

    async fn get(&self, user_id: &str, job_id: &str) -> Result<Option<Map<String, Value>>, StageError>;
}

#[derive(Default)]
pub struct InMemoryDocumentIndexStore {
    rows: Mutex<BTreeMap<(String, String), Map<String, Value>>>,
}

impl InMemoryDocumentIndexStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentIndexStore for InMemoryDocumentIndexStore {
    async fn upsert(&self, user_id: &str, job_id: &str, fields: Map<String, Value>) -> Result<(), StageError> {
        if user_id.is_empty() || job_id.is_empty() {
            return Ok(());
        }
        let mut rows = self.rows.lock().expect("poisoned");
        let entry = rows.entry((user_id.to_string(), job_id.to_string())).or_default();
        entry.insert("user_id".into(), Value::String(user_id.to_string()));
        entry.insert("job_id".into(), Value::String(job_id.to_string()));
        for (key, value) in fields {
            if value.is_null() {
                continue;
            }
            entry.insert(key, value);
        }
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Map<String, Value>>, StageError> {
        let rows = self.rows.lock().expect("poisoned");
        let mut docs: Vec<Map<String, Value>> = rows
            .iter()
            .filter(|((uid, _), _)| uid == user_id)
            .map(|(_, row)| row.clone())
            .collect();
        docs.sort_by(|a, b| {
            let a_updated = a.get("updated").and_then(Value::as_f64).unwrap_or(0.0);
            let b_updated = b.get("updated").and_then(Value::as_f64).unwrap_or(0.0);
            b_updated.partial_cmp(&a_updated).unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(docs)
    }

    async fn get(&self, user_id: &str, job_id: &str) -> Result<Option<Map<String, Value>>, StageError> {
        Ok(self
            .rows
            .lock()
            .expect("poisoned")
            .get(&(user_id.to_string(), job_id.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_merges_and_drops_null_fields() {
        let store = InMemoryDocumentIndexStore::new();
        store
            .upsert("u1", "j1", json!({"stage": "WRITE_DONE", "updated": 1.0}).as_object().unwrap().clone())
            .await
            .unwrap();
        store
            .upsert("u1", "j1", json!({"stage": "REVIEW_DONE", "last_error": null}).as_object().unwrap().clone())
            .await
            .unwrap();

        let row = store.get("u1", "j1").await.unwrap().unwrap();
        assert_eq!(row.get("stage").unwrap(), "REVIEW_DONE");
        assert_eq!(row.get("updated").unwrap(), 1.0);
        assert!(!row.contains_key("last_error"));
    }

    #[tokio::test]
    async fn list_sorts_by_updated_descending() {
        let store = InMemoryDocumentIndexStore::new();
        store.upsert("u1", "older", json!({"updated": 1.0}).as_object().unwrap().clone()).await.unwrap();
        store.upsert("u1", "newer", json!({"updated": 2.0}).as_object().unwrap().clone()).await.unwrap();

        let docs = store.list("u1").await.unwrap();
        assert_eq!(docs[0].get("job_id").unwrap(), "newer");
        assert_eq!(docs[1].get("job_id").unwrap(), "older");
    }
}
