//! Shared wire types for the document pipeline orchestrator: the job
//! payload and its embedded plan, cycle accounting, status events, queue
//! names, and the per-job storage path contract.

pub mod cycle;
pub mod job;
pub mod paths;
pub mod plan;
pub mod queue;
pub mod status;

pub use cycle::CycleState;
pub use job::JobPayload;
pub use paths::JobStoragePaths;
pub use plan::{DiagramSpec, GlobalStyle, OutlineSection, Plan};
pub use queue::{QueueName, DEFAULT_STATUS_TOPIC, FALLBACK_STATUS_TOPIC};
pub use status::StatusEvent;
