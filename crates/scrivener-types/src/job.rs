use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::plan::Plan;

/// The job payload, travelling on every queue.
///
/// Every field but `job_id`/`user_id` is optional: a stage may receive a
/// payload missing context it needs (e.g. `cycles`) and must hydrate it
/// from the status table rather than reject the message. Fields this
/// model doesn't name are preserved verbatim in `extra` and re-emitted on
/// the next hop, so a stage that doesn't understand a field never drops
/// it from the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    pub job_id: String,
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Canonical draft blob path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycles: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_cycles: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycles_completed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycles_remaining: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_summaries: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written_sections: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewritten_sections: Option<BTreeSet<String>>,

    /// Echoed copy of the review sub-scheduler's progress. The blob at
    /// `cycle_<k>/review_progress.json` is the sole source of truth; this
    /// field exists only so unrecognized writers round-trip it untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_progress: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohesion_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_summary_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_json: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_sections: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_rewrite: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_results: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_code_blocks: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_format: Option<String>,

    /// Everything this model doesn't name, passed through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobPayload {
    #[must_use]
    pub fn new(job_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// View this payload's cycle-relevant fields as the JSON map
    /// [`crate::cycle::CycleState::from_context`] expects, without a full
    /// serialize round-trip of every other field.
    #[must_use]
    pub fn cycle_context(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(v) = self.cycles {
            map.insert("cycles".into(), Value::from(v));
        }
        if let Some(v) = self.expected_cycles {
            map.insert("expected_cycles".into(), Value::from(v));
        }
        if let Some(v) = self.cycles_completed {
            map.insert("cycles_completed".into(), Value::from(v));
        }
        if let Some(v) = self.cycles_remaining {
            map.insert("cycles_remaining".into(), Value::from(v));
        }
        map
    }
}
