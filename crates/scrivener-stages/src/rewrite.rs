use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use scrivener_agents::materialize_section;
use scrivener_errors::StageError;
use scrivener_messaging::{publish_stage_event, send_queue};
use scrivener_rewrite::{affected_sections, combine_extra_guidance, is_rewrite_done, next_rewrite_batch, splice_section};
use scrivener_status::ensure_cycle_state_typed;
use scrivener_types::{JobPayload, QueueName};
use scrivener_worker::StageHandler;
use serde_json::{Map, Value};

use crate::context::{draft_path, Agents, StageContext};

/// `rewrite` (§4.7.7): regenerate every affected section (contradictions,
/// style/cohesion guidance, placeholder sections, or — absent any
/// section-scoped guidance — the whole outline when guidance is global),
/// then advance the cycle counter once every affected section has been
/// rewritten and route back to `review_general` or on to `diagram_prep`.
pub struct RewriteHandler {
    ctx: StageContext,
    agents: Arc<Agents>,
}

impl RewriteHandler {
    #[must_use]
    pub fn new(ctx: StageContext, agents: Arc<Agents>) -> Self {
        Self { ctx, agents }
    }

    async fn advance_cycle(&self, payload: &mut JobPayload, cycle_state: scrivener_types::CycleState) -> QueueName {
        let advanced = cycle_state.consume_rewrite();
        payload.cycles = Some(i64::from(advanced.requested));
        payload.expected_cycles = Some(i64::from(advanced.requested));
        payload.cycles_completed = Some(i64::from(advanced.completed));
        payload.cycles_remaining = Some(i64::from(advanced.remaining()));
        payload.rewritten_sections = Some(BTreeSet::new());
        payload.placeholder_sections = None;
        payload.extra.remove("contradiction_sections");
        payload.extra.remove("style_guidance_sections");
        payload.extra.remove("cohesion_guidance_sections");
        payload.extra.remove("style_guidance_text");
        payload.extra.remove("cohesion_guidance_text");
        payload.extra.remove("contradiction_text");

        if advanced.completed < advanced.requested {
            QueueName::ReviewGeneral
        } else {
            QueueName::DiagramPrep
        }
    }
}

fn extract_section_set(payload: &JobPayload, key: &str) -> BTreeSet<String> {
    payload
        .extra
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

fn extract_text(payload: &JobPayload, key: &str) -> String {
    payload.extra.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

#[async_trait]
impl StageHandler for RewriteHandler {
    fn queue(&self) -> QueueName {
        QueueName::Rewrite
    }

    fn stage_prefix(&self) -> &'static str {
        "REWRITE"
    }

    async fn handle(&self, mut payload: JobPayload) -> Result<(), StageError> {
        let cycle_state = ensure_cycle_state_typed(&mut payload, self.ctx.status_store.as_ref()).await;
        let paths = self.ctx.paths(&payload);

        if !payload.requires_rewrite.unwrap_or(false) {
            let next_queue = self.advance_cycle(&mut payload, cycle_state).await;
            send_queue(self.ctx.broker.as_ref(), next_queue, payload.clone()).await?;
            return publish_stage_event(
                self.ctx.broker.as_ref(),
                self.ctx.status_store.as_ref(),
                self.ctx.document_index.as_ref(),
                &self.ctx.config,
                "REWRITE",
                "DONE",
                &payload,
                Map::new(),
            )
            .await;
        }

        let plan = payload.plan.clone().ok_or_else(|| StageError::MissingContext {
            job_id: payload.job_id.clone(),
            reason: "rewrite stage requires a plan".to_string(),
        })?;

        let contradiction_sections = extract_section_set(&payload, "contradiction_sections");
        let style_sections = extract_section_set(&payload, "style_guidance_sections");
        let cohesion_sections = extract_section_set(&payload, "cohesion_guidance_sections");
        let placeholder_sections = payload.placeholder_sections.clone().unwrap_or_default();
        let style_text = extract_text(&payload, "style_guidance_text");
        let cohesion_text = extract_text(&payload, "cohesion_guidance_text");
        let has_global_guidance = !style_text.trim().is_empty() || !cohesion_text.trim().is_empty();

        let affected = affected_sections(
            &plan,
            &contradiction_sections,
            &style_sections,
            &cohesion_sections,
            &placeholder_sections,
            has_global_guidance,
        );

        let mut rewritten = payload.rewritten_sections.clone().unwrap_or_default();
        let batch = next_rewrite_batch(&plan, &affected, &rewritten, self.ctx.config.write_batch_size as usize);

        let mut draft = self
            .ctx
            .store
            .get_text(&draft_path(&payload, &paths))
            .await?
            .ok_or_else(|| StageError::MissingContext {
                job_id: payload.job_id.clone(),
                reason: "rewrite stage requires a draft".to_string(),
            })?;
        let extra_guidance = combine_extra_guidance(&style_text, &cohesion_text);
        let dependency_summaries = payload.dependency_summaries.clone().unwrap_or_default();

        for section_id in &batch {
            let Some(section) = plan.section(section_id) else { continue };
            let dep_context = section
                .dependencies
                .iter()
                .filter_map(|dep| dependency_summaries.get(dep))
                .cloned()
                .collect::<Vec<_>>()
                .join("\n");

            let guidance = if extra_guidance.is_empty() { None } else { Some(extra_guidance.as_str()) };
            let stream = self.agents.writer.write_section(&plan, section, &dep_context, guidance);
            let body = materialize_section(stream, self.ctx.config.max_section_tokens).await?;

            draft = splice_section(&draft, section_id, &body);
            rewritten.insert(section_id.clone());
        }

        self.ctx.store.put_text(&draft_path(&payload, &paths), &draft).await?;
        payload.rewritten_sections = Some(rewritten.clone());

        if !is_rewrite_done(&affected, &rewritten) {
            send_queue(self.ctx.broker.as_ref(), QueueName::Rewrite, payload.clone()).await?;
            publish_stage_event(
                self.ctx.broker.as_ref(),
                self.ctx.status_store.as_ref(),
                self.ctx.document_index.as_ref(),
                &self.ctx.config,
                "REWRITE",
                "IN_PROGRESS",
                &payload,
                Map::new(),
            )
            .await
        } else {
            let next_queue = self.advance_cycle(&mut payload, cycle_state).await;
            send_queue(self.ctx.broker.as_ref(), next_queue, payload.clone()).await?;
            publish_stage_event(
                self.ctx.broker.as_ref(),
                self.ctx.status_store.as_ref(),
                self.ctx.document_index.as_ref(),
                &self.ctx.config,
                "REWRITE",
                "DONE",
                &payload,
                Map::new(),
            )
            .await
        }
    }
}
