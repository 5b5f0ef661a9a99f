use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which of the four review sub-scheduler agents a stage is running.
/// Order matches the pipeline's fixed review sequence
/// (general -> style -> cohesion -> summary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAgentKind {
    General,
    Style,
    Cohesion,
    Summary,
}

impl ReviewAgentKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Style => "style",
            Self::Cohesion => "cohesion",
            Self::Summary => "summary",
        }
    }

    /// Filename of this agent's combined artifact under `cycle_<k>/`.
    #[must_use]
    pub const fn artifact_name(&self) -> &'static str {
        match self {
            Self::General => "review.json",
            Self::Style => "style.json",
            Self::Cohesion => "cohesion.json",
            Self::Summary => "executive_summary.json",
        }
    }

    /// The next review queue in sequence, or `None` after summary (which
    /// forwards to `verify`).
    #[must_use]
    pub const fn next(&self) -> Option<Self> {
        match self {
            Self::General => Some(Self::Style),
            Self::Style => Some(Self::Cohesion),
            Self::Cohesion => Some(Self::Summary),
            Self::Summary => None,
        }
    }
}

/// Per-agent batching state: which sections have been processed, whether
/// the agent has finished every outline section, and the findings
/// accumulated so far (merged incrementally, written out as the final
/// artifact once `done`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentProgress {
    #[serde(default)]
    pub sections_done: BTreeSet<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub accumulated: Map<String, Value>,
}

/// The full `cycle_<k>/review_progress.json` artifact: one [`AgentProgress`]
/// per agent plus the draft's total estimated token count (recorded once,
/// for metrics/telemetry; batching re-estimates per dispatch rather than
/// trusting a stale total).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewProgress {
    #[serde(default)]
    pub tokens_total: u64,
    #[serde(default)]
    pub general: AgentProgress,
    #[serde(default)]
    pub style: AgentProgress,
    #[serde(default)]
    pub cohesion: AgentProgress,
    #[serde(default)]
    pub summary: AgentProgress,
}

impl ReviewProgress {
    #[must_use]
    pub fn agent(&self, kind: ReviewAgentKind) -> &AgentProgress {
        match kind {
            ReviewAgentKind::General => &self.general,
            ReviewAgentKind::Style => &self.style,
            ReviewAgentKind::Cohesion => &self.cohesion,
            ReviewAgentKind::Summary => &self.summary,
        }
    }

    #[must_use]
    pub fn agent_mut(&mut self, kind: ReviewAgentKind) -> &mut AgentProgress {
        match kind {
            ReviewAgentKind::General => &mut self.general,
            ReviewAgentKind::Style => &mut self.style,
            ReviewAgentKind::Cohesion => &mut self.cohesion,
            ReviewAgentKind::Summary => &mut self.summary,
        }
    }

    /// Parse a persisted progress artifact, defaulting to a fresh one
    /// when absent or malformed (a corrupt blob should not wedge a job;
    /// it just restarts this cycle's review bookkeeping).
    #[must_use]
    pub fn load(raw: Option<&str>) -> Self {
        raw.and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default()
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
