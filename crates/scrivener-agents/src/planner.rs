use async_trait::async_trait;
use scrivener_errors::StageError;
use scrivener_types::Plan;

/// Produces a [`Plan`] (outline, glossary, global style, diagram specs)
/// for a document. The `plan` stage validates the result against §3's
/// schema and clamps `length_pages >= 60` itself; this trait only owns
/// the call.
#[async_trait]
pub trait PlannerAgent: Send + Sync {
    async fn plan(&self, title: &str, audience: &str, length_pages: u32) -> Result<Plan, StageError>;
}
