use std::sync::Arc;

use scrivener_agents::{
    BatchReviewAgent, DiagramRenderer, InterviewerAgent, PlannerAgent, SummarizerAgent, VerifierAgent, WriterAgent,
};
use scrivener_config::Config;
use scrivener_queue::QueueBroker;
use scrivener_status::{DocumentIndexStore, StatusStore};
use scrivener_store::ObjectStore;
use scrivener_types::{JobPayload, JobStoragePaths};
use camino::Utf8PathBuf;

/// The shared infrastructure every stage handler reaches through: broker,
/// blob store, status table, document index, and configuration. Cloning
/// is cheap (every field is an `Arc`), so each stage handler holds its
/// own copy rather than a reference with a lifetime tied to the worker
/// harness.
#[derive(Clone)]
pub struct StageContext {
    pub broker: Arc<dyn QueueBroker>,
    pub store: Arc<dyn ObjectStore>,
    pub status_store: Arc<dyn StatusStore>,
    pub document_index: Arc<dyn DocumentIndexStore>,
    pub config: Arc<Config>,
}

impl StageContext {
    #[must_use]
    pub fn new(
        broker: Arc<dyn QueueBroker>,
        store: Arc<dyn ObjectStore>,
        status_store: Arc<dyn StatusStore>,
        document_index: Arc<dyn DocumentIndexStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            broker,
            store,
            status_store,
            document_index,
            config,
        }
    }

    #[must_use]
    pub fn paths(&self, payload: &JobPayload) -> JobStoragePaths {
        JobStoragePaths::new(&payload.user_id, &payload.job_id)
    }
}

/// Every collaborator interface the stage processors drive, bundled so a
/// binary wires up one real-or-stub set and hands it to every stage
/// constructor.
#[derive(Clone)]
pub struct Agents {
    pub interviewer: Arc<dyn InterviewerAgent>,
    pub planner: Arc<dyn PlannerAgent>,
    pub writer: Arc<dyn WriterAgent>,
    pub general_reviewer: Arc<dyn BatchReviewAgent>,
    pub style_reviewer: Arc<dyn BatchReviewAgent>,
    pub cohesion_reviewer: Arc<dyn BatchReviewAgent>,
    pub summary_reviewer: Arc<dyn BatchReviewAgent>,
    pub verifier: Arc<dyn VerifierAgent>,
    pub summarizer: Arc<dyn SummarizerAgent>,
    pub diagram_renderer: Arc<dyn DiagramRenderer>,
}

/// The canonical draft blob path for this payload: its own `out` field
/// when set, falling back to the job's default `draft.md` path. Every
/// stage after `intake_resume` (which is responsible for defaulting
/// `out`) reads and writes the draft through this rather than hardcoding
/// `paths.draft()`, so a caller that redirected `out` elsewhere is
/// honored consistently.
#[must_use]
pub fn draft_path(payload: &JobPayload, paths: &JobStoragePaths) -> Utf8PathBuf {
    payload.out.as_deref().map(Utf8PathBuf::from).unwrap_or_else(|| paths.draft())
}
