//! Durable status table, per-user document index mirror, and the cycle
//! hydration protocol that lets any stage reconstruct a job's cycle
//! accounting from persistent storage alone.

mod document_index;
mod hydrate;
mod table;

pub use document_index::{DocumentIndexStore, InMemoryDocumentIndexStore};
pub use hydrate::{ensure_cycle_state, ensure_cycle_state_typed, hydrate_cycle_metadata};
pub use table::{history_row_key, InMemoryStatusStore, StatusStore, LATEST_ROW_KEY};
