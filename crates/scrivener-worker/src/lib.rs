//! The generic worker harness (§4.6): one instance per queue, running a
//! receive→dispatch loop with lock-renewal registered before dispatch,
//! bounded per-queue concurrency, and `Err`-dispatch that abandons
//! retryable failures for redelivery but completes terminal ones so they
//! don't loop forever (§7).

mod handler;
mod harness;
mod renewal;

pub use handler::StageHandler;
pub use harness::{ShutdownSignal, WorkerHarness};
pub use renewal::LockRenewal;
