use async_trait::async_trait;
use scrivener_errors::StageError;
use scrivener_messaging::publish_stage_event;
use scrivener_status::ensure_cycle_state_typed;
use scrivener_types::{JobPayload, QueueName};
use scrivener_worker::StageHandler;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::context::{Agents, StageContext};

/// `plan_intake` (§4.7.1): ask the interviewer for up to twelve questions,
/// persist them alongside a context snapshot and a sample-answers
/// template, and stop — there is no successor message. The caller is
/// expected to collect the author's answers and invoke
/// [`crate::send_resume`] once they've been uploaded.
pub struct PlanIntakeHandler {
    ctx: StageContext,
    agents: Arc<Agents>,
}

impl PlanIntakeHandler {
    #[must_use]
    pub fn new(ctx: StageContext, agents: Arc<Agents>) -> Self {
        Self { ctx, agents }
    }
}

#[async_trait]
impl StageHandler for PlanIntakeHandler {
    fn queue(&self) -> QueueName {
        QueueName::PlanIntake
    }

    fn stage_prefix(&self) -> &'static str {
        "INTAKE"
    }

    async fn handle(&self, mut payload: JobPayload) -> Result<(), StageError> {
        ensure_cycle_state_typed(&mut payload, self.ctx.status_store.as_ref()).await;
        let paths = self.ctx.paths(&payload);

        let title = payload.title.clone().unwrap_or_default();
        let mut questions = self.agents.interviewer.propose_questions(&title).await?;
        questions.truncate(12);

        let questions_json = serde_json::to_string(&questions).unwrap_or_default();
        self.ctx.store.put_text(&paths.intake("questions.json")?, &questions_json).await?;

        let context = json!({
            "job_id": payload.job_id,
            "user_id": payload.user_id,
            "title": payload.title,
            "audience": payload.audience,
            "out": payload.out,
            "cycles": payload.cycles,
            "expected_cycles": payload.expected_cycles,
        });
        self.ctx
            .store
            .put_text(&paths.intake("context.json")?, &serde_json::to_string(&context).unwrap_or_default())
            .await?;

        let mut sample_answers = Map::new();
        for question in &questions {
            if let Some(sample) = &question.sample {
                sample_answers.insert(question.id.clone(), Value::String(sample.clone()));
            }
        }
        self.ctx
            .store
            .put_text(
                &paths.intake("sample_answers.json")?,
                &serde_json::to_string(&Value::Object(sample_answers)).unwrap_or_default(),
            )
            .await?;

        let mut extra = Map::new();
        extra.insert("artifact".to_string(), Value::String("intake/questions.json".to_string()));
        extra.insert(
            "message".to_string(),
            Value::String("Intake questions ready; upload answers and resume to continue.".to_string()),
        );
        publish_stage_event(
            self.ctx.broker.as_ref(),
            self.ctx.status_store.as_ref(),
            self.ctx.document_index.as_ref(),
            &self.ctx.config,
            "INTAKE",
            "READY",
            &payload,
            extra,
        )
        .await
    }
}
