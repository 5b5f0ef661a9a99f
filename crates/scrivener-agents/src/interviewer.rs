use async_trait::async_trait;
use scrivener_errors::StageError;
use serde::{Deserialize, Serialize};

/// One intake question with a sample answer, used to seed the
/// `intake/sample_answers.json` artifact the caller can pre-fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewQuestion {
    pub id: String,
    pub q: String,
    #[serde(default)]
    pub sample: Option<String>,
}

/// Proposes intake questions for a document title. Implementations are
/// capped at 12 questions by the `plan_intake` stage, not by this trait,
/// so a collaborator that returns more than 12 is still a valid
/// implementation of the interface.
#[async_trait]
pub trait InterviewerAgent: Send + Sync {
    async fn propose_questions(&self, title: &str) -> Result<Vec<InterviewQuestion>, StageError>;
}
