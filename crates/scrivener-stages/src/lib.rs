//! The thirteen [`scrivener_worker::StageHandler`] implementations that
//! drive a job from intake through finalization, plus the shared context
//! (`StageContext`/`Agents`) and guidance-extraction helpers they lean on.

pub mod context;
pub mod diagram_prep;
pub mod diagram_render;
pub mod finalize;
pub mod guidance;
pub mod intake_resume;
pub mod plan;
pub mod plan_intake;
pub mod resume;
pub mod review;
pub mod rewrite;
pub mod verify;
pub mod write;

pub use context::{draft_path, Agents, StageContext};
pub use diagram_prep::DiagramPrepHandler;
pub use diagram_render::DiagramRenderHandler;
pub use finalize::FinalizeHandler;
pub use intake_resume::IntakeResumeHandler;
pub use plan::PlanHandler;
pub use plan_intake::PlanIntakeHandler;
pub use resume::send_resume;
pub use review::ReviewStageHandler;
pub use rewrite::RewriteHandler;
pub use verify::VerifyHandler;
pub use write::WriteHandler;
