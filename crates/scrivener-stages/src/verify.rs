use std::sync::Arc;

use async_trait::async_trait;
use scrivener_draft::{find_placeholder_sections, merge_revised_markdown};
use scrivener_errors::StageError;
use scrivener_messaging::{publish_stage_event, send_queue};
use scrivener_status::ensure_cycle_state_typed;
use scrivener_types::{JobPayload, QueueName};
use scrivener_worker::StageHandler;
use serde_json::{Map, Value};

use crate::context::{draft_path, Agents, StageContext};
use crate::guidance::{contradiction_sections_and_text, guidance_from_accumulated};

/// `verify` (§4.7.6): fold the general reviewer's `revised_markdown` into
/// the draft, scan for placeholder sections, run the verifier for
/// cross-section contradictions, and decide whether a rewrite pass is
/// needed — always forwarding to `rewrite`, which is responsible for
/// advancing the cycle counter either way.
pub struct VerifyHandler {
    ctx: StageContext,
    agents: Arc<Agents>,
}

impl VerifyHandler {
    #[must_use]
    pub fn new(ctx: StageContext, agents: Arc<Agents>) -> Self {
        Self { ctx, agents }
    }
}

#[async_trait]
impl StageHandler for VerifyHandler {
    fn queue(&self) -> QueueName {
        QueueName::Verify
    }

    fn stage_prefix(&self) -> &'static str {
        "VERIFY"
    }

    async fn handle(&self, mut payload: JobPayload) -> Result<(), StageError> {
        let cycle_state = ensure_cycle_state_typed(&mut payload, self.ctx.status_store.as_ref()).await;
        let paths = self.ctx.paths(&payload);
        let cycle_idx = cycle_state.completed + 1;

        let mut draft = self
            .ctx
            .store
            .get_text(&draft_path(&payload, &paths))
            .await?
            .ok_or_else(|| StageError::MissingContext {
                job_id: payload.job_id.clone(),
                reason: "verify stage requires a draft".to_string(),
            })?;

        let review_raw = match &payload.review_json {
            Some(text) => Some(text.clone()),
            None => self.ctx.store.get_text(&paths.cycle(cycle_idx, "review.json")?).await?,
        };
        if let Some(review_raw) = &review_raw {
            if let Ok(Value::Object(review)) = serde_json::from_str::<Value>(review_raw) {
                if let Some(revised_markdown) = review.get("revised_markdown").and_then(Value::as_str) {
                    draft = merge_revised_markdown(&draft, revised_markdown);
                }
            }
        }
        self.ctx.store.put_text(&draft_path(&payload, &paths), &draft).await?;

        let placeholder_sections = find_placeholder_sections(&draft);

        let dependency_summaries = payload.dependency_summaries.clone().unwrap_or_default();
        let contradictions_raw = self.agents.verifier.verify(&dependency_summaries, &draft).await?;
        let (has_contradictions, contradiction_sections, contradiction_text) =
            contradiction_sections_and_text(&contradictions_raw);
        self.ctx.store.put_text(&paths.cycle(cycle_idx, "contradictions.json")?, &contradictions_raw).await?;

        let style_raw = match &payload.style_json {
            Some(text) => text.clone(),
            None => self.ctx.store.get_text(&paths.cycle(cycle_idx, "style.json")?).await?.unwrap_or_default(),
        };
        let (style_text, style_sections) = guidance_from_accumulated(&style_raw);

        let cohesion_raw = match &payload.cohesion_json {
            Some(text) => text.clone(),
            None => self.ctx.store.get_text(&paths.cycle(cycle_idx, "cohesion.json")?).await?.unwrap_or_default(),
        };
        let (cohesion_text, cohesion_sections) = guidance_from_accumulated(&cohesion_raw);

        let needs_rewrite =
            has_contradictions || !style_text.trim().is_empty() || !cohesion_text.trim().is_empty() || !placeholder_sections.is_empty();

        if needs_rewrite {
            self.ctx.store.put_text(&paths.cycle(cycle_idx, "revision.md")?, &draft).await?;
        }

        payload.requires_rewrite = Some(needs_rewrite);
        payload.placeholder_sections = Some(placeholder_sections.clone());
        payload.extra.insert(
            "contradiction_sections".to_string(),
            serde_json::to_value(&contradiction_sections).unwrap_or_default(),
        );
        payload
            .extra
            .insert("style_guidance_sections".to_string(), serde_json::to_value(&style_sections).unwrap_or_default());
        payload.extra.insert(
            "cohesion_guidance_sections".to_string(),
            serde_json::to_value(&cohesion_sections).unwrap_or_default(),
        );
        payload.extra.insert("style_guidance_text".to_string(), Value::String(style_text.clone()));
        payload.extra.insert("cohesion_guidance_text".to_string(), Value::String(cohesion_text.clone()));
        payload.extra.insert("contradiction_text".to_string(), Value::String(contradiction_text));

        send_queue(self.ctx.broker.as_ref(), QueueName::Rewrite, payload.clone()).await?;

        let mut extra = Map::new();
        extra.insert("has_contradictions".to_string(), Value::Bool(has_contradictions));
        extra.insert("style_issues".to_string(), Value::Bool(!style_sections.is_empty()));
        extra.insert("cohesion_issues".to_string(), Value::Bool(!cohesion_sections.is_empty()));
        extra.insert("placeholder_sections".to_string(), Value::Bool(!placeholder_sections.is_empty()));
        publish_stage_event(
            self.ctx.broker.as_ref(),
            self.ctx.status_store.as_ref(),
            self.ctx.document_index.as_ref(),
            &self.ctx.config,
            "VERIFY",
            "DONE",
            &payload,
            extra,
        )
        .await
    }
}
