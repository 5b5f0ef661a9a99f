use std::collections::BTreeMap;

use async_trait::async_trait;
use scrivener_errors::StageError;

/// Checks a draft for cross-section contradictions given the running
/// dependency summaries, returning JSON with a top-level
/// `contradictions[]` array.
#[async_trait]
pub trait VerifierAgent: Send + Sync {
    async fn verify(&self, dependency_summaries: &BTreeMap<String, String>, draft: &str) -> Result<String, StageError>;
}
