use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use scrivener_agents::materialize_section;
use scrivener_deps::DependencyGraph;
use scrivener_draft::{extract_sections, TITLE_PAGE_END, TITLE_PAGE_START};
use scrivener_errors::StageError;
use scrivener_messaging::{publish_stage_event, send_queue};
use scrivener_status::ensure_cycle_state_typed;
use scrivener_types::{JobPayload, Plan, QueueName};
use scrivener_worker::StageHandler;
use serde_json::{Map, Value};

use crate::context::{draft_path, Agents, StageContext};

/// `write` (§4.7.4): process the next `write_batch_size` not-yet-written
/// outline sections in dependency-topological order, re-summarize each
/// into `dependency_summaries` for sections written after it, and
/// re-enqueue itself until the outline is exhausted.
pub struct WriteHandler {
    ctx: StageContext,
    agents: Arc<Agents>,
}

impl WriteHandler {
    #[must_use]
    pub fn new(ctx: StageContext, agents: Arc<Agents>) -> Self {
        Self { ctx, agents }
    }
}

fn title_page(plan: &Plan) -> String {
    format!("{TITLE_PAGE_START}\n# {}\n\n_Prepared for {}_\n{TITLE_PAGE_END}\n", plan.title, plan.audience)
}

/// Pull the `<!-- TITLE_PAGE_START -->…<!-- TITLE_PAGE_END -->` block out
/// of an already-loaded draft verbatim, markers included, so re-running
/// `write` against a partially-written draft never regenerates it.
fn existing_title_page(draft: &str) -> Option<String> {
    let start = draft.find(TITLE_PAGE_START)?;
    let end_marker = draft[start..].find(TITLE_PAGE_END)? + start + TITLE_PAGE_END.len();
    Some(draft[start..end_marker].to_string())
}

#[async_trait]
impl StageHandler for WriteHandler {
    fn queue(&self) -> QueueName {
        QueueName::Write
    }

    fn stage_prefix(&self) -> &'static str {
        "WRITE"
    }

    async fn handle(&self, mut payload: JobPayload) -> Result<(), StageError> {
        ensure_cycle_state_typed(&mut payload, self.ctx.status_store.as_ref()).await;
        let paths = self.ctx.paths(&payload);
        let plan = payload.plan.clone().ok_or_else(|| StageError::MissingContext {
            job_id: payload.job_id.clone(),
            reason: "write stage requires a plan".to_string(),
        })?;

        let graph = DependencyGraph::from_outline(&plan.outline);
        let order = graph.topological_order()?;

        let draft = self.ctx.store.get_text(&draft_path(&payload, &paths)).await?.unwrap_or_default();
        let existing_sections = extract_sections(&draft);

        let mut written: BTreeSet<String> = payload.written_sections.clone().unwrap_or_default();
        let mut dependency_summaries = payload.dependency_summaries.clone().unwrap_or_default();

        let remaining: Vec<String> = order.iter().filter(|id| !written.contains(*id)).cloned().collect();
        let batch: Vec<String> = remaining.into_iter().take(self.ctx.config.write_batch_size as usize).collect();

        let mut new_sections: std::collections::BTreeMap<String, String> = std::collections::BTreeMap::new();
        for section_id in &batch {
            let Some(section) = plan.section(section_id) else { continue };
            let dep_context = section
                .dependencies
                .iter()
                .filter_map(|dep| dependency_summaries.get(dep))
                .cloned()
                .collect::<Vec<_>>()
                .join("\n");

            let stream = self.agents.writer.write_section(&plan, section, &dep_context, None);
            let body = materialize_section(stream, self.ctx.config.max_section_tokens).await?;

            let block = format!("<!-- SECTION:{section_id}:START -->\n{}\n<!-- SECTION:{section_id}:END -->", body.trim());
            new_sections.insert(section_id.clone(), block);

            let summary = self.agents.summarizer.summarize_section(&body).await?;
            dependency_summaries.insert(section_id.clone(), summary);
            written.insert(section_id.clone());
        }

        let body_text = order
            .iter()
            .filter(|id| written.contains(*id))
            .map(|id| new_sections.get(id).or_else(|| existing_sections.get(id)).cloned().unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n\n");
        let title_page_block = existing_title_page(&draft).unwrap_or_else(|| title_page(&plan));
        let document = format!("{title_page_block}\n\n{body_text}\n");

        self.ctx.store.put_text(&paths.draft(), &document).await?;
        let out_path = draft_path(&payload, &paths);
        if out_path != paths.draft() {
            self.ctx.store.put_text(&out_path, &document).await?;
        }

        payload.written_sections = Some(written.clone());
        payload.dependency_summaries = Some(dependency_summaries);

        if written.len() < order.len() {
            send_queue(self.ctx.broker.as_ref(), QueueName::Write, payload.clone()).await?;
            publish_stage_event(
                self.ctx.broker.as_ref(),
                self.ctx.status_store.as_ref(),
                self.ctx.document_index.as_ref(),
                &self.ctx.config,
                "WRITE",
                "IN_PROGRESS",
                &payload,
                Map::new(),
            )
            .await
        } else {
            send_queue(self.ctx.broker.as_ref(), QueueName::ReviewGeneral, payload.clone()).await?;
            let mut extra = Map::new();
            extra.insert("artifact".to_string(), Value::String(paths.draft().to_string()));
            publish_stage_event(
                self.ctx.broker.as_ref(),
                self.ctx.status_store.as_ref(),
                self.ctx.document_index.as_ref(),
                &self.ctx.config,
                "WRITE",
                "DONE",
                &payload,
                extra,
            )
            .await
        }
    }
}
