use std::sync::Arc;

use async_trait::async_trait;
use scrivener_errors::StageError;
use scrivener_messaging::{publish_stage_event, send_queue};
use scrivener_review::{is_agent_done, merge_batch_result, next_batch, ReviewAgentKind, ReviewProgress};
use scrivener_status::ensure_cycle_state_typed;
use scrivener_types::{JobPayload, QueueName};
use scrivener_worker::StageHandler;
use serde_json::{Map, Value};

use crate::context::{draft_path, Agents, StageContext};

fn queue_for(kind: ReviewAgentKind) -> QueueName {
    match kind {
        ReviewAgentKind::General => QueueName::ReviewGeneral,
        ReviewAgentKind::Style => QueueName::ReviewStyle,
        ReviewAgentKind::Cohesion => QueueName::ReviewCohesion,
        ReviewAgentKind::Summary => QueueName::ReviewSummary,
    }
}

fn batch_size_for(kind: ReviewAgentKind, ctx: &StageContext) -> usize {
    let sizes = ctx.config.review_batch_sizes;
    match kind {
        ReviewAgentKind::General => sizes.general,
        ReviewAgentKind::Style => sizes.style,
        ReviewAgentKind::Cohesion => sizes.cohesion,
        ReviewAgentKind::Summary => sizes.summary,
    }
}

fn set_artifact_field(payload: &mut JobPayload, kind: ReviewAgentKind, artifact: String) {
    match kind {
        ReviewAgentKind::General => payload.review_json = Some(artifact),
        ReviewAgentKind::Style => payload.style_json = Some(artifact),
        ReviewAgentKind::Cohesion => payload.cohesion_json = Some(artifact),
        ReviewAgentKind::Summary => payload.exec_summary_json = Some(artifact),
    }
}

/// One of the four review sub-scheduler stages (§4.7.5): general, style,
/// cohesion, and summary, all driven by the same batching/merge/forward
/// logic over a different [`scrivener_agents::BatchReviewAgent`] and a
/// different slot in `cycle_<k>/review_progress.json`.
///
/// Status events use the literal prefix `"REVIEW"` (not e.g.
/// `"REVIEW_STYLE"`) regardless of which queue is running, so the
/// messaging facade's cyclic-stage detection (which matches on the exact
/// prefix) attaches a `cycle` number to every one of them, matching the
/// source pipeline's review event naming.
pub struct ReviewStageHandler {
    ctx: StageContext,
    agents: Arc<Agents>,
    kind: ReviewAgentKind,
}

impl ReviewStageHandler {
    #[must_use]
    pub fn new(ctx: StageContext, agents: Arc<Agents>, kind: ReviewAgentKind) -> Self {
        Self { ctx, agents, kind }
    }

    fn agent(&self) -> &dyn scrivener_agents::BatchReviewAgent {
        match self.kind {
            ReviewAgentKind::General => self.agents.general_reviewer.as_ref(),
            ReviewAgentKind::Style => self.agents.style_reviewer.as_ref(),
            ReviewAgentKind::Cohesion => self.agents.cohesion_reviewer.as_ref(),
            ReviewAgentKind::Summary => self.agents.summary_reviewer.as_ref(),
        }
    }
}

#[async_trait]
impl StageHandler for ReviewStageHandler {
    fn queue(&self) -> QueueName {
        queue_for(self.kind)
    }

    fn stage_prefix(&self) -> &'static str {
        "REVIEW"
    }

    async fn handle(&self, mut payload: JobPayload) -> Result<(), StageError> {
        let cycle_state = ensure_cycle_state_typed(&mut payload, self.ctx.status_store.as_ref()).await;
        let paths = self.ctx.paths(&payload);

        if cycle_state.completed >= cycle_state.requested {
            return send_queue(self.ctx.broker.as_ref(), QueueName::DiagramPrep, payload).await;
        }

        let cycle_idx = cycle_state.completed + 1;
        let progress_path = paths.cycle(cycle_idx, "review_progress.json")?;
        let mut progress = ReviewProgress::load(self.ctx.store.get_text(&progress_path).await?.as_deref());

        if progress.agent(self.kind).done {
            let next_queue = match self.kind.next() {
                Some(next_kind) => queue_for(next_kind),
                None => QueueName::Verify,
            };
            return send_queue(self.ctx.broker.as_ref(), next_queue, payload).await;
        }

        let plan = payload.plan.clone().ok_or_else(|| StageError::MissingContext {
            job_id: payload.job_id.clone(),
            reason: "review stage requires a plan".to_string(),
        })?;
        let draft = self
            .ctx
            .store
            .get_text(&draft_path(&payload, &paths))
            .await?
            .ok_or_else(|| StageError::MissingContext {
                job_id: payload.job_id.clone(),
                reason: "review stage requires a draft".to_string(),
            })?;
        let dependency_summaries = payload.dependency_summaries.clone().unwrap_or_default();

        let batch_opt = next_batch(
            &draft,
            &plan,
            &progress.agent(self.kind).sections_done,
            &dependency_summaries,
            batch_size_for(self.kind, &self.ctx),
            self.ctx.config.review_max_prompt_tokens,
        )?;

        if let Some(batch) = &batch_opt {
            let raw = self.agent().review_batch(&plan, &batch.prompt, &batch.section_ids).await?;
            merge_batch_result(progress.agent_mut(self.kind), self.kind, &batch.section_ids, &raw);
            self.ctx.store.put_text(&progress_path, &progress.to_json()).await?;
        }

        if is_agent_done(&progress.agent(self.kind).sections_done, &plan) {
            progress.agent_mut(self.kind).done = true;
            let artifact_text = serde_json::to_string(&progress.agent(self.kind).accumulated).unwrap_or_default();
            self.ctx.store.put_text(&paths.cycle(cycle_idx, self.kind.artifact_name())?, &artifact_text).await?;
            self.ctx.store.put_text(&progress_path, &progress.to_json()).await?;
            set_artifact_field(&mut payload, self.kind, artifact_text);

            match self.kind.next() {
                Some(next_kind) => {
                    send_queue(self.ctx.broker.as_ref(), queue_for(next_kind), payload.clone()).await?;
                    let mut extra = Map::new();
                    extra.insert("artifact".to_string(), Value::String(self.kind.artifact_name().to_string()));
                    publish_stage_event(
                        self.ctx.broker.as_ref(),
                        self.ctx.status_store.as_ref(),
                        self.ctx.document_index.as_ref(),
                        &self.ctx.config,
                        "REVIEW",
                        "IN_PROGRESS",
                        &payload,
                        extra,
                    )
                    .await
                }
                None => {
                    send_queue(self.ctx.broker.as_ref(), QueueName::Verify, payload.clone()).await?;
                    let mut extra = Map::new();
                    extra.insert("message".to_string(), Value::String("Review complete".to_string()));
                    publish_stage_event(
                        self.ctx.broker.as_ref(),
                        self.ctx.status_store.as_ref(),
                        self.ctx.document_index.as_ref(),
                        &self.ctx.config,
                        "REVIEW",
                        "DONE",
                        &payload,
                        extra,
                    )
                    .await
                }
            }
        } else {
            send_queue(self.ctx.broker.as_ref(), self.queue(), payload.clone()).await?;
            publish_stage_event(
                self.ctx.broker.as_ref(),
                self.ctx.status_store.as_ref(),
                self.ctx.document_index.as_ref(),
                &self.ctx.config,
                "REVIEW",
                "IN_PROGRESS",
                &payload,
                Map::new(),
            )
            .await
        }
    }
}
