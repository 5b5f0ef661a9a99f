use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use scrivener_errors::StageError;

use crate::ObjectStore;

/// In-process object store backed by a `BTreeMap`, used by unit and
/// integration tests so a full pipeline run doesn't need a filesystem.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    blobs: Mutex<BTreeMap<Utf8PathBuf, Vec<u8>>>,
}

impl InMemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_text(&self, path: &Utf8Path, content: &str) -> Result<(), StageError> {
        self.put_bytes(path, content.as_bytes()).await
    }

    async fn put_bytes(&self, path: &Utf8Path, content: &[u8]) -> Result<(), StageError> {
        self.blobs
            .lock()
            .expect("in-memory store mutex poisoned")
            .insert(path.to_path_buf(), content.to_vec());
        Ok(())
    }

    async fn get_text(&self, path: &Utf8Path) -> Result<Option<String>, StageError> {
        match self.get_bytes(path).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StageError::Decode {
                    queue: path.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn get_bytes(&self, path: &Utf8Path) -> Result<Option<Vec<u8>>, StageError> {
        Ok(self
            .blobs
            .lock()
            .expect("in-memory store mutex poisoned")
            .get(path)
            .cloned())
    }

    async fn list(&self, prefix: &Utf8Path) -> Result<Vec<Utf8PathBuf>, StageError> {
        Ok(self
            .blobs
            .lock()
            .expect("in-memory store mutex poisoned")
            .keys()
            .filter(|p| p.as_str().starts_with(prefix.as_str()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_text_and_lists_by_prefix() {
        let store = InMemoryObjectStore::new();
        store.put_text(Utf8Path::new("jobs/u/j/draft.md"), "hello").await.unwrap();
        store.put_text(Utf8Path::new("jobs/u/j/plan.json"), "{}").await.unwrap();
        store.put_text(Utf8Path::new("jobs/other/j2/draft.md"), "nope").await.unwrap();

        assert_eq!(
            store.get_text(Utf8Path::new("jobs/u/j/draft.md")).await.unwrap(),
            Some("hello".to_string())
        );
        assert_eq!(store.get_text(Utf8Path::new("jobs/u/j/missing.md")).await.unwrap(), None);

        let listed = store.list(Utf8Path::new("jobs/u/j")).await.unwrap();
        assert_eq!(listed.len(), 2);
    }
}
