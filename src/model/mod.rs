//! Domain types for emergency call intake
//!
//! This module defines the shared data model:
//! - Transcript chunks streamed by callers
//! - Structured information extracted from transcripts
//! - Per-caller call records with extraction history
//! - The versioned aggregate disaster summary

mod extraction;
mod person;
mod summary;

pub use extraction::{DisasterType, ExtractedInfo, SeverityLevel};
pub use person::{PersonRecord, TranscriptChunk};
pub use summary::{AffectedArea, CallTotals, DisasterSummary};
