//! End-to-end pipeline tests (§8): build the full set of thirteen stage
//! handlers over in-memory infrastructure and drive a job through them
//! with [`WorkerHarness::run_once`], queue by queue, asserting on the
//! observable state each scenario names — status events, queue
//! occupancy, and the persisted artifacts.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use scrivener_agents::stub::{
    StubBatchReviewer, StubDiagramRenderer, StubInterviewer, StubPlanner, StubSummarizer, StubVerifier, StubWriter,
};
use scrivener_agents::VerifierAgent;
use scrivener_config::Config;
use scrivener_errors::StageError;
use scrivener_queue::{InMemoryQueueBroker, QueueBroker};
use scrivener_review::ReviewAgentKind;
use scrivener_stages::{
    Agents, DiagramPrepHandler, DiagramRenderHandler, FinalizeHandler, IntakeResumeHandler, PlanHandler,
    PlanIntakeHandler, ReviewStageHandler, RewriteHandler, StageContext, VerifyHandler, WriteHandler,
};
use scrivener_status::{InMemoryDocumentIndexStore, InMemoryStatusStore};
use scrivener_store::{InMemoryObjectStore, ObjectStore};
use scrivener_types::{JobPayload, OutlineSection, Plan, QueueName};
use scrivener_worker::{StageHandler, WorkerHarness};

/// Everything a test needs a handle on: the concrete broker (for
/// `queue_len`/`published_events`), the store (to inspect artifacts),
/// and the per-queue handler map to drive with [`drain_all`] or
/// individually.
struct Pipeline {
    broker: Arc<InMemoryQueueBroker>,
    store: Arc<InMemoryObjectStore>,
    harness: WorkerHarness,
    handlers: BTreeMap<&'static str, Arc<dyn StageHandler>>,
}

fn handler_key(queue: QueueName) -> &'static str {
    queue.as_default_str()
}

fn build_pipeline(config: Config, agents: Agents) -> Pipeline {
    let broker = Arc::new(InMemoryQueueBroker::new());
    let store = Arc::new(InMemoryObjectStore::new());
    let status_store = Arc::new(InMemoryStatusStore::new());
    let document_index = Arc::new(InMemoryDocumentIndexStore::new());
    let config = Arc::new(config);

    let broker_dyn: Arc<dyn QueueBroker> = broker.clone();
    let store_dyn: Arc<dyn ObjectStore> = store.clone();
    let status_store_dyn: Arc<dyn scrivener_status::StatusStore> = status_store.clone();
    let document_index_dyn: Arc<dyn scrivener_status::DocumentIndexStore> = document_index.clone();
    let ctx = StageContext::new(broker_dyn.clone(), store_dyn, status_store_dyn, document_index_dyn, config.clone());
    let agents = Arc::new(agents);

    let handler_list: Vec<Arc<dyn StageHandler>> = vec![
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

    let mut handlers = BTreeMap::new();
    for handler in handler_list {
        handlers.insert(handler_key(handler.queue()), handler);
    }

    let harness = WorkerHarness::new(broker_dyn, status_store, document_index, config);

    Pipeline { broker, store, harness, handlers }
}

fn default_agents() -> Agents {
    Agents {
        interviewer: Arc::new(StubInterviewer),
        planner: Arc::new(StubPlanner),
        writer: Arc::new(StubWriter),
        general_reviewer: Arc::new(StubBatchReviewer),
        style_reviewer: Arc::new(StubBatchReviewer),
        cohesion_reviewer: Arc::new(StubBatchReviewer),
        summary_reviewer: Arc::new(StubBatchReviewer),
        verifier: Arc::new(StubVerifier),
        summarizer: Arc::new(StubSummarizer),
        diagram_renderer: Arc::new(StubDiagramRenderer),
    }
}

impl Pipeline {
    /// Run every non-empty queue's handler once, round-robin, until none
    /// of them make progress. Only valid for success paths: a failing
    /// handler's message gets abandoned and immediately redelivered by
    /// the in-memory broker, which would spin forever here.
    async fn drain_all(&self) {
        for _ in 0..200 {
            let mut progressed = false;
            for queue in QueueName::ALL {
                let key = handler_key(queue);
                if self.broker.queue_len(queue) > 0 {
                    let handler = self.handlers.get(key).expect("every queue has a handler").clone();
                    let processed = self.harness.run_once(handler).await.expect("run_once never errors directly");
                    if processed > 0 {
                        progressed = true;
                    }
                }
            }
            if !progressed {
                break;
            }
        }
    }

    async fn run_once_on(&self, queue: QueueName) -> usize {
        let handler = self.handlers.get(handler_key(queue)).expect("handler registered").clone();
        self.harness.run_once(handler).await.expect("run_once never errors directly")
    }

    fn stage_events(&self) -> Vec<String> {
        self.broker
            .published_events()
            .into_iter()
            .filter_map(|(_, value)| value.get("stage").and_then(|s| s.as_str().map(str::to_string)))
            .collect()
    }
}

fn submit_payload(job_id: &str, title: &str, cycles: i64) -> JobPayload {
    let mut payload = JobPayload::new(job_id, "user-1");
    payload.title = Some(title.to_string());
    payload.audience = Some("general readers".to_string());
    payload.cycles = Some(cycles);
    payload.expected_cycles = Some(cycles);
    payload
}

/// Drive a freshly submitted job through `plan_intake` -> `intake_resume`
/// so it lands on `plan`, ready for the rest of the pipeline.
async fn intake(pipeline: &Pipeline, payload: JobPayload) {
    pipeline.broker.send(QueueName::PlanIntake, payload).await.unwrap();
    pipeline.run_once_on(QueueName::PlanIntake).await;
    assert_eq!(pipeline.broker.queue_len(QueueName::IntakeResume), 1);
    pipeline.run_once_on(QueueName::IntakeResume).await;
    assert_eq!(pipeline.broker.queue_len(QueueName::Plan), 1);
}

#[tokio::test]
async fn happy_path_single_cycle_reaches_finalize_done() {
    let pipeline = build_pipeline(Config::default(), default_agents());
    let payload = submit_payload("job-1", "A Guide to Testing", 1);
    intake(&pipeline, payload).await;
    pipeline.drain_all().await;

    let events = pipeline.stage_events();
    assert!(events.contains(&"WRITE_DONE".to_string()));
    assert!(events.contains(&"REVIEW_DONE".to_string()));
    assert!(events.contains(&"VERIFY_DONE".to_string()));
    assert!(events.contains(&"REWRITE_DONE".to_string()));
    assert!(events.contains(&"DIAGRAM_SKIPPED".to_string()), "no plantuml blocks in the stub draft");
    assert!(events.contains(&"FINALIZE_DONE".to_string()));

    // Three hand-offs between the four review agents, one per stub-plan
    // section batch since write_batch_size(5) and review_batch_size(3+)
    // both exceed the three-section outline in a single dispatch.
    let review_in_progress = events.iter().filter(|e| *e == "REVIEW_IN_PROGRESS").count();
    assert_eq!(review_in_progress, 3, "general->style, style->cohesion, cohesion->summary");

    for queue in QueueName::ALL {
        assert_eq!(pipeline.broker.queue_len(queue), 0, "{queue:?} should be fully drained");
    }

    let final_text = pipeline
        .store
        .get_text(camino::Utf8Path::new("jobs/user-1/job-1/final.md"))
        .await
        .unwrap()
        .expect("finalize persists final.md");
    assert!(final_text.contains("Table of Contents"));
    assert!(final_text.contains("Introduction"));
    assert!(final_text.contains("Details"));
    assert!(final_text.contains("Conclusion"));
}

/// Verifier that reports a contradiction on `s2` the first time it's
/// called and none thereafter, forcing exactly one rewrite loop.
struct OneShotContradictionVerifier {
    calls: AtomicUsize,
}

impl OneShotContradictionVerifier {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl VerifierAgent for OneShotContradictionVerifier {
    async fn verify(&self, _dependency_summaries: &BTreeMap<String, String>, _draft: &str) -> Result<String, StageError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            Ok(serde_json::json!({
                "contradictions": [{"section_id": "s2", "issue": "dates disagree with section s1"}]
            })
            .to_string())
        } else {
            Ok(serde_json::json!({ "contradictions": [] }).to_string())
        }
    }
}

#[tokio::test]
async fn rewrite_loop_runs_two_cycles_before_finalizing() {
    let mut agents = default_agents();
    agents.verifier = Arc::new(OneShotContradictionVerifier::new());

    let pipeline = build_pipeline(Config::default(), agents);
    let payload = submit_payload("job-2", "A Guide to Testing", 2);
    intake(&pipeline, payload).await;
    pipeline.drain_all().await;

    let events = pipeline.stage_events();
    let rewrite_done = events.iter().filter(|e| *e == "REWRITE_DONE").count();
    assert_eq!(rewrite_done, 2, "one rewrite completion per requested cycle");
    assert!(events.contains(&"FINALIZE_DONE".to_string()));

    // The first cycle's VERIFY_DONE must report a contradiction; the
    // second cycle's must not.
    let verify_details: Vec<serde_json::Value> = pipeline
        .broker
        .published_events()
        .into_iter()
        .filter(|(_, v)| v.get("stage").and_then(|s| s.as_str()) == Some("VERIFY_DONE"))
        .map(|(_, v)| v)
        .collect();
    assert_eq!(verify_details.len(), 2);
    assert_eq!(verify_details[0]["has_contradictions"], serde_json::json!(true));
    assert_eq!(verify_details[1]["has_contradictions"], serde_json::json!(false));

    for queue in QueueName::ALL {
        assert_eq!(pipeline.broker.queue_len(queue), 0, "{queue:?} should be fully drained");
    }
}

/// A planner that always returns the same seven-section linear chain
/// (`s1` -> `s2` -> ... -> `s7`), used to exercise the review batching
/// sub-scheduler across more than one dispatch per agent.
struct SevenSectionPlanner;

#[async_trait]
impl scrivener_agents::PlannerAgent for SevenSectionPlanner {
    async fn plan(&self, title: &str, audience: &str, length_pages: u32) -> Result<Plan, StageError> {
        let outline = (1..=7)
            .map(|i| OutlineSection {
                id: format!("s{i}"),
                title: format!("Section {i}"),
                goals: vec![format!("cover topic {i}")],
                key_points: vec![],
                dependencies: if i == 1 { Default::default() } else { [format!("s{}", i - 1)].into_iter().collect() },
            })
            .collect();
        Ok(Plan {
            title: title.to_string(),
            audience: audience.to_string(),
            length_pages: length_pages.max(60),
            outline,
            glossary: Default::default(),
            global_style: Default::default(),
            diagram_specs: vec![],
        })
    }
}

#[tokio::test]
async fn batched_review_dispatches_three_batches_per_agent_for_seven_sections() {
    let mut config = Config::default();
    config.review_batch_sizes.general = 3;
    config.review_batch_sizes.style = 3;
    config.review_batch_sizes.cohesion = 3;
    config.review_batch_sizes.summary = 3;
    // Seven sections exceed the default write batch size too, so writing
    // needs two dispatches (5 then 2); that's orthogonal to what this
    // test is checking and drain_all handles it transparently.

    let mut agents = default_agents();
    agents.planner = Arc::new(SevenSectionPlanner);

    let pipeline = build_pipeline(config, agents);
    let payload = submit_payload("job-3", "A Long Guide", 1);
    intake(&pipeline, payload).await;
    pipeline.drain_all().await;

    let events = pipeline.stage_events();
    // 3 batches (3,3,1) per agent: two self-loop REVIEW_IN_PROGRESS plus
    // one forwarding REVIEW_IN_PROGRESS to the next agent, for three of
    // the four agents, plus a final REVIEW_DONE from summary.
    let review_in_progress = events.iter().filter(|e| *e == "REVIEW_IN_PROGRESS").count();
    assert_eq!(review_in_progress, 4 * 3 - 1, "3 batches/agent x 4 agents, minus the last agent's forward-to-verify");
    assert_eq!(events.iter().filter(|e| *e == "REVIEW_DONE").count(), 1);
    assert!(events.contains(&"FINALIZE_DONE".to_string()));

    for queue in QueueName::ALL {
        assert_eq!(pipeline.broker.queue_len(queue), 0, "{queue:?} should be fully drained");
    }
}

#[tokio::test]
async fn invalid_plantuml_block_fails_diagram_prep_without_a_successor() {
    let pipeline = build_pipeline(Config::default(), default_agents());
    let plan = Plan {
        title: "T".to_string(),
        audience: "A".to_string(),
        length_pages: 60,
        outline: vec![],
        glossary: Default::default(),
        global_style: Default::default(),
        diagram_specs: vec![],
    };

    // Mermaid source inside a fenced `plantuml` block: genuinely invalid
    // under §4.11's validation (spec §8 scenario 5's failure path).
    let draft = "intro\n\n```plantuml\n@startmermaid\nA->>B: hi\n```\n\noutro";
    pipeline
        .store
        .put_text(camino::Utf8Path::new("jobs/user-1/job-4/draft.md"), draft)
        .await
        .unwrap();

    let mut payload = JobPayload::new("job-4", "user-1");
    payload.plan = Some(plan);
    pipeline.broker.send(QueueName::DiagramPrep, payload).await.unwrap();

    let processed = pipeline.run_once_on(QueueName::DiagramPrep).await;
    assert_eq!(processed, 1);

    let events = pipeline.stage_events();
    assert!(events.contains(&"DIAGRAM_FAILED".to_string()));
    assert_eq!(pipeline.broker.queue_len(QueueName::DiagramRender), 0, "no successor enqueued on validation failure");
    assert_eq!(pipeline.broker.queue_len(QueueName::FinalizeReady), 0);
    assert_eq!(
        pipeline.broker.queue_len(QueueName::DiagramPrep),
        0,
        "a semantic failure is terminal: the message is completed, not redelivered forever"
    );
}

#[tokio::test]
async fn dependency_cycle_in_outline_aborts_the_write_stage() {
    let pipeline = build_pipeline(Config::default(), default_agents());

    let outline = vec![
        OutlineSection {
            id: "a".to_string(),
            title: "A".to_string(),
            goals: vec![],
            key_points: vec![],
            dependencies: ["b".to_string()].into_iter().collect(),
        },
        OutlineSection {
            id: "b".to_string(),
            title: "B".to_string(),
            goals: vec![],
            key_points: vec![],
            dependencies: ["a".to_string()].into_iter().collect(),
        },
    ];
    let plan = Plan {
        title: "Cyclic".to_string(),
        audience: "A".to_string(),
        length_pages: 60,
        outline,
        glossary: Default::default(),
        global_style: Default::default(),
        diagram_specs: vec![],
    };

    let mut payload = JobPayload::new("job-5", "user-1");
    payload.plan = Some(plan);
    payload.dependency_summaries = Some(BTreeMap::new());
    pipeline.broker.send(QueueName::Write, payload).await.unwrap();

    let processed = pipeline.run_once_on(QueueName::Write).await;
    assert_eq!(processed, 1);

    let events = pipeline.stage_events();
    assert!(!events.contains(&"WRITE_DONE".to_string()));
    assert_eq!(pipeline.broker.queue_len(QueueName::ReviewGeneral), 0);
    assert_eq!(
        pipeline.broker.queue_len(QueueName::Write),
        0,
        "a dependency cycle is a structural property of the plan: redelivery can't fix it, so the message is completed, not retried forever"
    );
}

#[tokio::test]
async fn review_stage_short_circuits_to_diagram_prep_once_cycles_are_exhausted() {
    let pipeline = build_pipeline(Config::default(), default_agents());

    let plan = scrivener_agents::PlannerAgent::plan(&StubPlanner, "T", "A", 60).await.unwrap();

    let mut payload = JobPayload::new("job-6", "user-1");
    payload.plan = Some(plan);
    payload.cycles = Some(1);
    payload.expected_cycles = Some(1);
    payload.cycles_completed = Some(1);
    pipeline.broker.send(QueueName::ReviewGeneral, payload).await.unwrap();

    let processed = pipeline.run_once_on(QueueName::ReviewGeneral).await;
    assert_eq!(processed, 1);

    assert_eq!(pipeline.broker.queue_len(QueueName::DiagramPrep), 1, "exhausted cycle budget skips straight to diagram_prep");
    assert_eq!(pipeline.broker.queue_len(QueueName::ReviewStyle), 0);
    let events = pipeline.stage_events();
    assert!(
        !events.iter().any(|e| e.starts_with("REVIEW_") && e != "REVIEW_START"),
        "the short-circuit path publishes no review progress event"
    );
}

#[tokio::test]
async fn write_preserves_the_title_page_across_batches() {
    let pipeline = build_pipeline(Config::default(), {
        let mut agents = default_agents();
        agents.planner = Arc::new(SevenSectionPlanner);
        agents
    });
    let payload = submit_payload("job-7", "A Long Guide", 1);
    intake(&pipeline, payload).await;
    pipeline.run_once_on(QueueName::Plan).await;
    assert_eq!(pipeline.broker.queue_len(QueueName::Write), 1);

    // Seven sections with the default write_batch_size(5) need two
    // dispatches; the title page must come out byte-identical both times.
    pipeline.run_once_on(QueueName::Write).await;
    let draft_path = camino::Utf8Path::new("jobs/user-1/job-7/draft.md");
    let first = pipeline.store.get_text(draft_path).await.unwrap().expect("draft persisted after first batch");
    let first_title_page = &first[..first.find("<!-- TITLE_PAGE_END -->").unwrap() + "<!-- TITLE_PAGE_END -->".len()];

    assert_eq!(pipeline.broker.queue_len(QueueName::Write), 1, "second batch still pending");
    pipeline.run_once_on(QueueName::Write).await;
    let second = pipeline.store.get_text(draft_path).await.unwrap().expect("draft persisted after second batch");
    let second_title_page = &second[..second.find("<!-- TITLE_PAGE_END -->").unwrap() + "<!-- TITLE_PAGE_END -->".len()];

    assert_eq!(first_title_page, second_title_page, "title page must be preserved, not regenerated, across write batches");
}
