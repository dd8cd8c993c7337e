//! Call processing pipeline
//!
//! `CallProcessor` dispatches inbound protocol messages for one caller at a
//! time: chunk buffering and the extraction trigger policy, heartbeats, and
//! call-end flushing. `SummaryCoordinator` debounces summary recomputation
//! to one in-flight cycle and persists results with optimistic concurrency.

mod processor;
mod summary;

pub use processor::CallProcessor;
pub use summary::SummaryCoordinator;
