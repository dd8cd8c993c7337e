//! Durable-storage collaborator contracts
//!
//! The call pipeline talks to storage through these traits and assumes the
//! backing store provides atomic append and compare-and-swap. The in-memory
//! implementations here back the default deployment and the test suite.

mod person;
mod summary;

pub use person::{MemoryPersonStore, PersonStore};
pub use summary::{MemorySummaryStore, SummaryStore, SummaryStoreError};
