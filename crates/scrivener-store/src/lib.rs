//! Object store abstraction: blob reads/writes under a job's storage
//! namespace, plus content-addressed allocation for artifacts (rendered
//! diagrams) that are worth deduplicating across jobs.

mod in_memory;
mod local_fs;

pub use in_memory::InMemoryObjectStore;
pub use local_fs::LocalFsObjectStore;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use scrivener_errors::StageError;

/// Blob storage the pipeline reads and writes artifacts through.
///
/// Every path is relative to the store root (typically produced by
/// [`scrivener_types::JobStoragePaths`]); implementations own how that
/// maps onto an actual backend. All operations that can fail for reasons
/// redelivery could fix (a transient network blip, a backend outage)
/// return [`StageError::Transient`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_text(&self, path: &Utf8Path, content: &str) -> Result<(), StageError>;

    async fn put_bytes(&self, path: &Utf8Path, content: &[u8]) -> Result<(), StageError>;

    /// `Ok(None)` when the path doesn't exist; writers are idempotent by
    /// path, so a missing blob is a normal "not written yet" state, not
    /// an error.
    async fn get_text(&self, path: &Utf8Path) -> Result<Option<String>, StageError>;

    async fn get_bytes(&self, path: &Utf8Path) -> Result<Option<Vec<u8>>, StageError>;

    /// List blob paths under `prefix`, non-recursive-vs-recursive is an
    /// implementation choice; callers only rely on it including every
    /// blob whose path starts with `prefix`.
    async fn list(&self, prefix: &Utf8Path) -> Result<Vec<Utf8PathBuf>, StageError>;

    /// Store `content` at a path derived from its BLAKE3 digest under
    /// `blobs/<hex-digest>.<ext>`, returning that path. Writing the same
    /// bytes twice is a no-op the second time: the digest is the same, so
    /// the path is the same, and the write is idempotent.
    async fn allocate_document_blob(&self, content: &[u8], ext: &str) -> Result<Utf8PathBuf, StageError> {
        let digest = blake3::hash(content).to_hex();
        let path = Utf8PathBuf::from(format!("blobs/{digest}.{ext}"));
        if self.get_bytes(&path).await?.is_none() {
            self.put_bytes(&path, content).await?;
        }
        Ok(path)
    }
}
