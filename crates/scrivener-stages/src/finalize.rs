use async_trait::async_trait;
use scrivener_diagram::DiagramResult;
use scrivener_draft::{insert_table_of_contents, number_markdown_headings};
use scrivener_errors::StageError;
use scrivener_messaging::publish_stage_event;
use scrivener_status::ensure_cycle_state_typed;
use scrivener_types::{JobPayload, QueueName};
use scrivener_worker::StageHandler;
use serde_json::{Map, Value};

use crate::context::{draft_path, StageContext};

/// `finalize` (§4.7.10): substitute every rendered diagram back into the
/// draft, number headings, insert a table of contents, and persist the
/// result as the job's finished document. PDF/DOCX export sits outside
/// the collaborator boundary this pipeline drives and has no interface
/// to call, so the finalized artifact is always the numbered Markdown.
pub struct FinalizeHandler {
    ctx: StageContext,
}

impl FinalizeHandler {
    #[must_use]
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StageHandler for FinalizeHandler {
    fn queue(&self) -> QueueName {
        QueueName::FinalizeReady
    }

    fn stage_prefix(&self) -> &'static str {
        "FINALIZE"
    }

    async fn handle(&self, mut payload: JobPayload) -> Result<(), StageError> {
        ensure_cycle_state_typed(&mut payload, self.ctx.status_store.as_ref()).await;
        let paths = self.ctx.paths(&payload);

        let draft = self
            .ctx
            .store
            .get_text(&draft_path(&payload, &paths))
            .await?
            .ok_or_else(|| StageError::MissingContext {
                job_id: payload.job_id.clone(),
                reason: "finalize stage requires a draft".to_string(),
            })?;

        let diagram_results: Vec<DiagramResult> = payload
            .diagram_results
            .clone()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();

        let with_diagrams = scrivener_diagram::apply_diagram_results(&draft, &diagram_results);
        let numbered = number_markdown_headings(&with_diagrams);
        let finalized = insert_table_of_contents(&numbered);

        let final_path = paths.final_document("md");
        self.ctx.store.put_text(&final_path, &finalized).await?;

        let mut extra = Map::new();
        extra.insert("artifact".to_string(), Value::String(final_path.to_string()));
        publish_stage_event(
            self.ctx.broker.as_ref(),
            self.ctx.status_store.as_ref(),
            self.ctx.document_index.as_ref(),
            &self.ctx.config,
            "FINALIZE",
            "DONE",
            &payload,
            extra,
        )
        .await
    }
}
