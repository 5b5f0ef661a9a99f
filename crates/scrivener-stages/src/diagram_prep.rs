use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use scrivener_diagram::prepare_diagrams;
use scrivener_errors::StageError;
use scrivener_messaging::{publish_stage_event, send_queue};
use scrivener_status::ensure_cycle_state_typed;
use scrivener_types::{JobPayload, QueueName};
use scrivener_worker::StageHandler;
use serde_json::{Map, Value};

use crate::context::{draft_path, StageContext};

/// `diagram_prep` (§4.7.8): extract, sanitize, and validate every PlantUML
/// block in the draft. A validation failure aborts the job — spec names
/// `DIAGRAM_FAILED` as the only explicit status event for this stage, so
/// the success path forwards to `diagram_render` without announcing
/// itself beyond the harness's generic `DIAGRAM_PREP_START`.
pub struct DiagramPrepHandler {
    ctx: StageContext,
}

impl DiagramPrepHandler {
    #[must_use]
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StageHandler for DiagramPrepHandler {
    fn queue(&self) -> QueueName {
        QueueName::DiagramPrep
    }

    fn stage_prefix(&self) -> &'static str {
        "DIAGRAM_PREP"
    }

    async fn handle(&self, mut payload: JobPayload) -> Result<(), StageError> {
        ensure_cycle_state_typed(&mut payload, self.ctx.status_store.as_ref()).await;
        let paths = self.ctx.paths(&payload);

        let plan = payload.plan.clone().ok_or_else(|| StageError::MissingContext {
            job_id: payload.job_id.clone(),
            reason: "diagram_prep stage requires a plan".to_string(),
        })?;
        let draft = self
            .ctx
            .store
            .get_text(&draft_path(&payload, &paths))
            .await?
            .ok_or_else(|| StageError::MissingContext {
                job_id: payload.job_id.clone(),
                reason: "diagram_prep stage requires a draft".to_string(),
            })?;

        let prepared = match prepare_diagrams(&draft, &plan) {
            Ok(prepared) => prepared,
            Err(issues) => {
                let message = issues.join("; ");
                let mut extra = Map::new();
                extra.insert("message".to_string(), Value::String(message.clone()));
                publish_stage_event(
                    self.ctx.broker.as_ref(),
                    self.ctx.status_store.as_ref(),
                    self.ctx.document_index.as_ref(),
                    &self.ctx.config,
                    "DIAGRAM",
                    "FAILED",
                    &payload,
                    extra,
                )
                .await?;
                return Err(StageError::Semantic {
                    stage: "diagram_prep".to_string(),
                    reason: message,
                });
            }
        };

        if prepared.is_empty() {
            payload.diagram_results = Some(Vec::new());
            send_queue(self.ctx.broker.as_ref(), QueueName::FinalizeReady, payload.clone()).await?;
            let mut extra = Map::new();
            extra.insert("message".to_string(), Value::String("No diagrams found; skipping render".to_string()));
            return publish_stage_event(
                self.ctx.broker.as_ref(),
                self.ctx.status_store.as_ref(),
                self.ctx.document_index.as_ref(),
                &self.ctx.config,
                "DIAGRAM",
                "SKIPPED",
                &payload,
                extra,
            )
            .await;
        }

        let mut requests = Vec::with_capacity(prepared.len());
        let mut code_blocks = BTreeMap::new();
        for diagram in &prepared {
            let source_path = paths.relative(&diagram.request.source_path)?;
            self.ctx.store.put_text(&source_path, &diagram.sanitized_body).await?;
            code_blocks.insert(diagram.request.diagram_id.clone(), diagram.original_block.clone());
            requests.push(diagram.request.clone());
        }

        payload.diagram_code_blocks = Some(code_blocks);
        payload
            .extra
            .insert("diagram_requests".to_string(), serde_json::to_value(&requests).unwrap_or_default());

        send_queue(self.ctx.broker.as_ref(), QueueName::DiagramRender, payload).await
    }
}
