use async_trait::async_trait;
use scrivener_errors::StageError;
use scrivener_types::Plan;

/// Whole-draft review, used outside the batching sub-scheduler (e.g. a
/// one-shot sanity pass). The review stages themselves only ever call
/// [`BatchReviewAgent::review_batch`].
#[async_trait]
pub trait ReviewerAgent: Send + Sync {
    async fn review(&self, plan: &Plan, draft: &str) -> Result<String, StageError>;
}

/// Shared shape for the four review sub-scheduler agents (general, style,
/// cohesion, summary): review a composed batch prompt covering a handful
/// of sections and return JSON with a top-level `sections[]` array, each
/// entry carrying `section_id`, `issues`, `suggestions`, and — for the
/// general agent specifically — an optional per-section `revised_markdown`,
/// and — for the summary agent — a `summary`.
#[async_trait]
pub trait BatchReviewAgent: Send + Sync {
    async fn review_batch(&self, plan: &Plan, prompt: &str, sections: &[String]) -> Result<String, StageError>;
}
