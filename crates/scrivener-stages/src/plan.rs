use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use scrivener_errors::StageError;
use scrivener_messaging::{publish_stage_event, send_queue};
use scrivener_status::ensure_cycle_state_typed;
use scrivener_types::{JobPayload, Plan, QueueName};
use scrivener_worker::StageHandler;
use serde_json::{Map, Value};

use crate::context::{Agents, StageContext};

/// `plan` (§4.7.3): call the planner, reusing a prior run's title,
/// audience, and length when this is a retry, merge intake answers'
/// tone/pov/structure/constraints into `global_style`, clamp the page
/// count, and persist `plan.json` before handing the job to `write`.
pub struct PlanHandler {
    ctx: StageContext,
    agents: Arc<Agents>,
}

impl PlanHandler {
    #[must_use]
    pub fn new(ctx: StageContext, agents: Arc<Agents>) -> Self {
        Self { ctx, agents }
    }
}

fn merge_intake_answers(plan: &mut Plan, answers: &Map<String, Value>) {
    if plan.global_style.tone.is_none() {
        plan.global_style.tone = answers.get("tone").and_then(Value::as_str).map(str::to_string);
    }
    if plan.global_style.pov.is_none() {
        plan.global_style.pov = answers.get("pov").and_then(Value::as_str).map(str::to_string);
    }
    for key in ["structure", "constraints"] {
        if let Some(text) = answers.get(key).and_then(Value::as_str) {
            if !text.trim().is_empty() {
                plan.global_style.formatting_rules.push(text.trim().to_string());
            }
        }
    }
}

#[async_trait]
impl StageHandler for PlanHandler {
    fn queue(&self) -> QueueName {
        QueueName::Plan
    }

    fn stage_prefix(&self) -> &'static str {
        "PLAN"
    }

    async fn handle(&self, mut payload: JobPayload) -> Result<(), StageError> {
        ensure_cycle_state_typed(&mut payload, self.ctx.status_store.as_ref()).await;
        let paths = self.ctx.paths(&payload);

        let prior: Option<Plan> = self
            .ctx
            .store
            .get_text(&paths.plan())
            .await?
            .and_then(|raw| serde_json::from_str(&raw).ok());

        let title = prior.as_ref().map(|p| p.title.clone()).unwrap_or_else(|| payload.title.clone().unwrap_or_default());
        let audience = prior
            .as_ref()
            .map(|p| p.audience.clone())
            .unwrap_or_else(|| payload.audience.clone().unwrap_or_default());
        let length_pages = prior.as_ref().map(|p| p.length_pages).unwrap_or(60);

        let mut plan = self.agents.planner.plan(&title, &audience, length_pages).await?;
        if let Some(prior) = &prior {
            plan.title = prior.title.clone();
            plan.audience = prior.audience.clone();
            plan.length_pages = prior.length_pages;
        }
        plan.length_pages = plan.length_pages.max(60);

        if let Some(raw) = self.ctx.store.get_text(&paths.intake("answers.json")?).await? {
            if let Ok(Value::Object(answers)) = serde_json::from_str::<Value>(&raw) {
                merge_intake_answers(&mut plan, &answers);
            }
        }

        let plan_json = serde_json::to_string(&plan).unwrap_or_default();
        self.ctx.store.put_text(&paths.plan(), &plan_json).await?;

        payload.plan = Some(plan);
        payload.dependency_summaries = Some(BTreeMap::new());

        send_queue(self.ctx.broker.as_ref(), QueueName::Write, payload.clone()).await?;

        let mut extra = Map::new();
        extra.insert("artifact".to_string(), Value::String("plan.json".to_string()));
        publish_stage_event(
            self.ctx.broker.as_ref(),
            self.ctx.status_store.as_ref(),
            self.ctx.document_index.as_ref(),
            &self.ctx.config,
            "PLAN",
            "DONE",
            &payload,
            extra,
        )
        .await
    }
}
