//! Collaborator interfaces the stage orchestrator calls through: the
//! interview, planning, writing, review, and verification agents, plus
//! the PlantUML renderer. Every method is an opaque request/response (or,
//! for the writer, a lazy fragment stream) — the orchestrator never
//! inspects prompt construction or provider wire formats, matching
//! spec §1's "external collaborator" boundary.

pub mod diagram_renderer;
pub mod interviewer;
pub mod planner;
pub mod reviewer;
pub mod stub;
pub mod summarizer;
pub mod verifier;
pub mod writer;

pub use diagram_renderer::{DiagramFormat, DiagramRenderer};
pub use interviewer::{InterviewQuestion, InterviewerAgent};
pub use planner::PlannerAgent;
pub use reviewer::{BatchReviewAgent, ReviewerAgent};
pub use summarizer::SummarizerAgent;
pub use verifier::VerifierAgent;
pub use writer::{SectionFragmentStream, WriterAgent};
