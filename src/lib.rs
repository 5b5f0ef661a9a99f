//! scrivener — worker binary for the document-generation pipeline.
//!
//! The library crate wires the collaborator interfaces and infrastructure
//! traits from the `scrivener-*` crates into a runnable set of
//! [`scrivener_worker::WorkerHarness`] loops, one per queue, and exposes
//! the `scrivener` CLI's argument parsing and dispatch. All pipeline
//! logic lives in the `scrivener-*` crates; this crate is assembly only.

pub mod cli;
pub mod wiring;

pub use cli::{run, Cli};
