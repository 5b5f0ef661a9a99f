use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use scrivener_errors::StageError;

use crate::ObjectStore;

/// Object store rooted at a local directory, used for on-disk development
/// and for tests that want to exercise real filesystem I/O via `tempfile`.
#[derive(Debug, Clone)]
pub struct LocalFsObjectStore {
    root: Utf8PathBuf,
}

impl LocalFsObjectStore {
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        self.root.join(path)
    }

    fn transient(operation: &str, err: impl std::fmt::Display) -> StageError {
        StageError::Transient {
            operation: operation.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalFsObjectStore {
    async fn put_text(&self, path: &Utf8Path, content: &str) -> Result<(), StageError> {
        self.put_bytes(path, content.as_bytes()).await
    }

    async fn put_bytes(&self, path: &Utf8Path, content: &[u8]) -> Result<(), StageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::transient("create_dir_all", e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| Self::transient("write", e))
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
        let full = self.resolve(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::transient("read", e)),
        }
    }

    async fn list(&self, prefix: &Utf8Path) -> Result<Vec<Utf8PathBuf>, StageError> {
        let dir = self.resolve(prefix);
        let mut out = Vec::new();
        let mut stack = vec![dir.clone()];
        while let Some(current) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::transient("read_dir", e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::transient("read_dir_next", e))?
            {
                let path = Utf8PathBuf::try_from(entry.path())
                    .map_err(|e| Self::transient("non_utf8_path", e))?;
                let file_type = entry.file_type().await.map_err(|e| Self::transient("file_type", e))?;
                if file_type.is_dir() {
                    stack.push(path);
                } else {
                    let relative = path
                        .strip_prefix(&self.root)
                        .map_err(|e| Self::transient("strip_prefix", e))?
                        .to_path_buf();
                    out.push(relative);
                }
            }
        }
        Ok(out)
    }
}
