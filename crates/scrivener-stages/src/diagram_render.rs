use std::sync::Arc;

use async_trait::async_trait;
use scrivener_agents::DiagramFormat;
use scrivener_diagram::{DiagramRequest, DiagramResult};
use scrivener_errors::StageError;
use scrivener_messaging::{publish_stage_event, send_queue};
use scrivener_status::ensure_cycle_state_typed;
use scrivener_types::{JobPayload, QueueName};
use scrivener_worker::StageHandler;
use serde_json::Map;

use crate::context::{Agents, StageContext};

const MAX_RENDER_ATTEMPTS: u32 = 3;

/// `diagram_render` (§4.7.9): render each prepared PlantUML source,
/// retrying the identical sanitized source up to three times on failure
/// (there is no LLM-assisted regeneration collaborator to fall back to),
/// and forward to `finalize` regardless of per-diagram failures —
/// `finalize` substitutes only the diagrams that rendered.
pub struct DiagramRenderHandler {
    ctx: StageContext,
    agents: Arc<Agents>,
}

impl DiagramRenderHandler {
    #[must_use]
    pub fn new(ctx: StageContext, agents: Arc<Agents>) -> Self {
        Self { ctx, agents }
    }

    async fn render_one(
        &self,
        paths: &scrivener_types::JobStoragePaths,
        request: &DiagramRequest,
        code_block: String,
    ) -> Result<DiagramResult, StageError> {
        let source_path = paths.relative(&request.source_path)?;
        let blob_path = paths.relative(&request.blob_path)?;
        let paths_source = self.ctx.store.get_text(&source_path).await?.ok_or_else(|| StageError::MissingContext {
            job_id: request.diagram_id.clone(),
            reason: format!("missing diagram source at {}", request.source_path),
        })?;
        let format = DiagramFormat::parse(&request.format);

        let mut last_err = None;
        for _ in 0..MAX_RENDER_ATTEMPTS {
            match self.agents.diagram_renderer.render(format, &paths_source).await {
                Ok(bytes) => {
                    self.ctx.store.put_bytes(&blob_path, &bytes).await?;
                    return Ok(DiagramResult {
                        diagram_id: request.diagram_id.clone(),
                        blob_path: Some(request.blob_path.clone()),
                        relative_path: Some(request.blob_path.clone()),
                        code_block,
                        format: request.format.clone(),
                        alt_text: request.alt_text.clone(),
                        error: None,
                    });
                }
                Err(err) => last_err = Some(err.to_string()),
            }
        }

        Ok(DiagramResult {
            diagram_id: request.diagram_id.clone(),
            blob_path: None,
            relative_path: None,
            code_block,
            format: request.format.clone(),
            alt_text: request.alt_text.clone(),
            error: last_err,
        })
    }
}

#[async_trait]
impl StageHandler for DiagramRenderHandler {
    fn queue(&self) -> QueueName {
        QueueName::DiagramRender
    }

    fn stage_prefix(&self) -> &'static str {
        "DIAGRAM"
    }

    async fn handle(&self, mut payload: JobPayload) -> Result<(), StageError> {
        ensure_cycle_state_typed(&mut payload, self.ctx.status_store.as_ref()).await;
        let paths = self.ctx.paths(&payload);

        let requests: Vec<DiagramRequest> = payload
            .extra
            .get("diagram_requests")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let code_blocks = payload.diagram_code_blocks.clone().unwrap_or_default();

        let mut results = Vec::with_capacity(requests.len());
        for request in &requests {
            let code_block = code_blocks.get(&request.diagram_id).cloned().unwrap_or_default();
            results.push(self.render_one(&paths, request, code_block).await?);
        }

        payload.diagram_results = Some(results.iter().map(|r| serde_json::to_value(r).unwrap_or_default()).collect());
        payload.extra.remove("diagram_requests");

        send_queue(self.ctx.broker.as_ref(), QueueName::FinalizeReady, payload.clone()).await?;

        publish_stage_event(
            self.ctx.broker.as_ref(),
            self.ctx.status_store.as_ref(),
            self.ctx.document_index.as_ref(),
            &self.ctx.config,
            "DIAGRAM",
            "DONE",
            &payload,
            Map::new(),
        )
        .await?;

        publish_stage_event(
            self.ctx.broker.as_ref(),
            self.ctx.status_store.as_ref(),
            self.ctx.document_index.as_ref(),
            &self.ctx.config,
            "FINALIZE",
            "QUEUED",
            &payload,
            Map::new(),
        )
        .await
    }
}
