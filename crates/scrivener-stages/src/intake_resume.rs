use async_trait::async_trait;
use scrivener_errors::StageError;
use scrivener_messaging::{publish_stage_event, send_queue};
use scrivener_status::ensure_cycle_state_typed;
use scrivener_types::{JobPayload, QueueName};
use scrivener_worker::StageHandler;
use serde_json::{Map, Value};

use crate::context::StageContext;

/// `intake_resume` (§4.7.2): reload whatever core fields the caller's
/// `intake_resume` message omitted from `intake/context.json`, make sure
/// the canonical draft blob exists, and hand the job off to `plan`.
pub struct IntakeResumeHandler {
    ctx: StageContext,
}

impl IntakeResumeHandler {
    #[must_use]
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StageHandler for IntakeResumeHandler {
    fn queue(&self) -> QueueName {
        QueueName::IntakeResume
    }

    fn stage_prefix(&self) -> &'static str {
        "INTAKE"
    }

    async fn handle(&self, mut payload: JobPayload) -> Result<(), StageError> {
        ensure_cycle_state_typed(&mut payload, self.ctx.status_store.as_ref()).await;
        let paths = self.ctx.paths(&payload);

        if payload.title.is_none() || payload.audience.is_none() || payload.out.is_none() {
            if let Some(raw) = self.ctx.store.get_text(&paths.intake("context.json")?).await? {
                if let Ok(Value::Object(context)) = serde_json::from_str::<Value>(&raw) {
                    if payload.title.is_none() {
                        payload.title = context.get("title").and_then(Value::as_str).map(str::to_string);
                    }
                    if payload.audience.is_none() {
                        payload.audience = context.get("audience").and_then(Value::as_str).map(str::to_string);
                    }
                    if payload.out.is_none() {
                        payload.out = context.get("out").and_then(Value::as_str).map(str::to_string);
                    }
                }
            }
        }

        if payload.out.is_none() {
            payload.out = Some(paths.draft().to_string());
        }
        let draft_path = crate::context::draft_path(&payload, &paths);
        if self.ctx.store.get_text(&draft_path).await?.is_none() {
            self.ctx.store.put_text(&draft_path, "").await?;
        }

        send_queue(self.ctx.broker.as_ref(), QueueName::Plan, payload.clone()).await?;

        publish_stage_event(
            self.ctx.broker.as_ref(),
            self.ctx.status_store.as_ref(),
            self.ctx.document_index.as_ref(),
            &self.ctx.config,
            "INTAKE",
            "RESUMED",
            &payload,
            Map::new(),
        )
        .await
    }
}
