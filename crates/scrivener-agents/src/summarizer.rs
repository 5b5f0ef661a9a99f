use async_trait::async_trait;
use scrivener_errors::StageError;

/// Re-summarizes a section's accumulated markdown into 5-10 bullet key
/// facts, stored as that section's entry in `dependency_summaries` for
/// sections written after it.
#[async_trait]
pub trait SummarizerAgent: Send + Sync {
    async fn summarize_section(&self, markdown: &str) -> Result<String, StageError>;
}
