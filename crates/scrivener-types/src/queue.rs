use serde::{Deserialize, Serialize};

/// Names of the thirteen pipeline queues, in state-machine order.
///
/// Each variant is a single stage processor's input queue. The default
/// wire name (`as_default_str`) may be overridden per-deployment by
/// `scrivener_config::Config`; workers and the messaging facade always
/// address queues by `QueueName`, never by raw string, so a rename can't
/// desync a sender from its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueName {
    PlanIntake,
    IntakeResume,
    Plan,
    Write,
    ReviewGeneral,
    ReviewStyle,
    ReviewCohesion,
    ReviewSummary,
    Verify,
    Rewrite,
    DiagramPrep,
    DiagramRender,
    FinalizeReady,
}

impl QueueName {
    pub const ALL: [QueueName; 13] = [
        Self::PlanIntake,
        Self::IntakeResume,
        Self::Plan,
        Self::Write,
        Self::ReviewGeneral,
        Self::ReviewStyle,
        Self::ReviewCohesion,
        Self::ReviewSummary,
        Self::Verify,
        Self::Rewrite,
        Self::DiagramPrep,
        Self::DiagramRender,
        Self::FinalizeReady,
    ];

    /// Default wire name, unconfigured.
    #[must_use]
    pub const fn as_default_str(&self) -> &'static str {
        match self {
            Self::PlanIntake => "plan_intake",
            Self::IntakeResume => "intake_resume",
            Self::Plan => "plan",
            Self::Write => "write",
            Self::ReviewGeneral => "review_general",
            Self::ReviewStyle => "review_style",
            Self::ReviewCohesion => "review_cohesion",
            Self::ReviewSummary => "review_summary",
            Self::Verify => "verify",
            Self::Rewrite => "rewrite",
            Self::DiagramPrep => "diagram_prep",
            Self::DiagramRender => "diagram_render",
            Self::FinalizeReady => "finalize_ready",
        }
    }

    /// Upper-snake label used in status stage names (e.g. `WRITE_DONE`).
    #[must_use]
    pub const fn stage_label(&self) -> &'static str {
        match self {
            Self::PlanIntake => "PLAN_INTAKE",
            Self::IntakeResume => "INTAKE_RESUME",
            Self::Plan => "PLAN",
            Self::Write => "WRITE",
            Self::ReviewGeneral => "REVIEW_GENERAL",
            Self::ReviewStyle => "REVIEW_STYLE",
            Self::ReviewCohesion => "REVIEW_COHESION",
            Self::ReviewSummary => "REVIEW_SUMMARY",
            Self::Verify => "VERIFY",
            Self::Rewrite => "REWRITE",
            Self::DiagramPrep => "DIAGRAM_PREP",
            Self::DiagramRender => "DIAGRAM_RENDER",
            Self::FinalizeReady => "FINALIZE_READY",
        }
    }
}

/// Default status fan-out topic and its fallback, per the messaging contract.
pub const DEFAULT_STATUS_TOPIC: &str = "aidocwriter-status";
pub const FALLBACK_STATUS_TOPIC: &str = "docwriter-status";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_match_every_queue() {
        let names: Vec<&str> = QueueName::ALL.iter().map(QueueName::as_default_str).collect();
        assert_eq!(names.len(), 13);
        assert!(names.contains(&"plan_intake"));
        assert!(names.contains(&"finalize_ready"));
    }
}
