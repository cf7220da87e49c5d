//! Pipeline orchestration and domain logic for Prospector.
//!
//! This crate ties the provider adapters, the credit ledger and the response
//! cache into the per-company chain (search → enrich → verify → classify)
//! and drives whole runs through [`Orchestrator`].

pub mod cache;
pub mod classify;
pub mod enrich;
pub mod gateway;
pub mod ledger;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod search;
pub mod sink;
pub mod verify;

#[cfg(test)]
pub mod testing;

pub use orchestrator::Orchestrator;
pub use progress::{ProgressReporter, SilentProgress};
pub use sink::{JsonLinesSink, MemorySink, RecordFormat, RecordSink};
