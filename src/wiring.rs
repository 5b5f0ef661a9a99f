//! Assembles the infrastructure and collaborator trait objects every
//! stage handler needs, and the thirteen handlers themselves.

use std::sync::Arc;

use scrivener_agents::stub::{
    StubBatchReviewer, StubInterviewer, StubPlanner, StubSummarizer, StubVerifier, StubWriter,
};
use scrivener_agents::diagram_renderer::HttpPlantUmlRenderer;
use scrivener_agents::DiagramRenderer;
use scrivener_config::Config;
use scrivener_queue::{InMemoryQueueBroker, QueueBroker};
use scrivener_review::ReviewAgentKind;
use scrivener_stages::{
    Agents, DiagramPrepHandler, DiagramRenderHandler, FinalizeHandler, IntakeResumeHandler, PlanHandler,
    PlanIntakeHandler, ReviewStageHandler, RewriteHandler, StageContext, VerifyHandler, WriteHandler,
};
use scrivener_status::{DocumentIndexStore, InMemoryDocumentIndexStore, InMemoryStatusStore, StatusStore};
use scrivener_store::{InMemoryObjectStore, LocalFsObjectStore, ObjectStore};
use scrivener_worker::StageHandler;

/// Where job artifacts (drafts, plans, diagrams, the final document) are
/// persisted. There is no Azure Blob-backed [`ObjectStore`] in this
/// crate — only a local-filesystem and an in-memory implementation — so
/// a real deployment's object storage is whichever of these two is
/// appropriate; see DESIGN.md.
pub enum StorageBackend {
    Memory,
    LocalFs(camino::Utf8PathBuf),
}

/// Whether to call a real PlantUML server or return a fixed stub image.
/// Every other collaborator (interviewer, planner, writer, reviewers,
/// verifier, summarizer) has no non-stub implementation in this crate —
/// they're the LLM-backed boundary the pipeline orchestrates but never
/// calls itself.
pub enum DiagramBackend {
    Stub,
    Http(String),
}

/// Everything a running process needs: the shared infrastructure, the
/// collaborator set, and one handler per queue, in [`scrivener_types::QueueName::ALL`] order.
pub struct Wiring {
    pub broker: Arc<dyn QueueBroker>,
    pub status_store: Arc<dyn StatusStore>,
    pub document_index: Arc<dyn DocumentIndexStore>,
    pub config: Arc<Config>,
    pub handlers: Vec<Arc<dyn StageHandler>>,
}

#[must_use]
pub fn build(storage: StorageBackend, diagrams: DiagramBackend, config: Config) -> Wiring {
    let store: Arc<dyn ObjectStore> = match storage {
        StorageBackend::Memory => Arc::new(InMemoryObjectStore::new()),
        StorageBackend::LocalFs(root) => Arc::new(LocalFsObjectStore::new(root)),
    };
    let diagram_renderer: Arc<dyn DiagramRenderer> = match diagrams {
        DiagramBackend::Stub => Arc::new(scrivener_agents::stub::StubDiagramRenderer),
        DiagramBackend::Http(base_url) => Arc::new(HttpPlantUmlRenderer::new(base_url)),
    };

    let broker: Arc<dyn QueueBroker> = Arc::new(InMemoryQueueBroker::new());
    let status_store: Arc<dyn StatusStore> = Arc::new(InMemoryStatusStore::new());
    let document_index: Arc<dyn DocumentIndexStore> = Arc::new(InMemoryDocumentIndexStore::new());
    let config = Arc::new(config);

    let ctx = StageContext::new(broker.clone(), store, status_store.clone(), document_index.clone(), config.clone());
    let agents = Arc::new(Agents {
        interviewer: Arc::new(StubInterviewer),
        planner: Arc::new(StubPlanner),
        writer: Arc::new(StubWriter),
        general_reviewer: Arc::new(StubBatchReviewer),
        style_reviewer: Arc::new(StubBatchReviewer),
        cohesion_reviewer: Arc::new(StubBatchReviewer),
        summary_reviewer: Arc::new(StubBatchReviewer),
        verifier: Arc::new(StubVerifier),
        summarizer: Arc::new(StubSummarizer),
        diagram_renderer,
    });

    let handlers: Vec<Arc<dyn StageHandler>> = vec![
        Arc::new(PlanIntakeHandler::new(ctx.clone(), agents.clone())),
        Arc::new(IntakeResumeHandler::new(ctx.clone())),
        Arc::new(PlanHandler::new(ctx.clone(), agents.clone())),
        Arc::new(WriteHandler::new(ctx.clone(), agents.clone())),
        Arc::new(ReviewStageHandler::new(ctx.clone(), agents.clone(), ReviewAgentKind::General)),
        Arc::new(ReviewStageHandler::new(ctx.clone(), agents.clone(), ReviewAgentKind::Style)),
        Arc::new(ReviewStageHandler::new(ctx.clone(), agents.clone(), ReviewAgentKind::Cohesion)),
        Arc::new(ReviewStageHandler::new(ctx.clone(), agents.clone(), ReviewAgentKind::Summary)),
        Arc::new(VerifyHandler::new(ctx.clone(), agents.clone())),
        Arc::new(RewriteHandler::new(ctx.clone(), agents.clone())),
        Arc::new(DiagramPrepHandler::new(ctx.clone())),
        Arc::new(DiagramRenderHandler::new(ctx.clone(), agents.clone())),
        Arc::new(FinalizeHandler::new(ctx)),
    ];

    Wiring {
        broker,
        status_store,
        document_index,
        config,
        handlers,
    }
}
