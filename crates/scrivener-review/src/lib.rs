//! Review sub-scheduler (§4.8): batches a draft's sections by topological
//! order under size and token caps, runs one of the four review agents
//! over each batch, and persists per-agent progress so a review stage
//! can self-reenqueue across many dispatches.

mod batching;
mod progress;

pub use batching::{estimate_tokens, is_agent_done, merge_batch_result, next_batch, ReviewBatch};
pub use progress::{AgentProgress, ReviewAgentKind, ReviewProgress};
