use super::extraction::ExtractedInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inbound speech segment from a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptChunk {
    /// Transcribed text
    pub text: String,

    /// Client-assigned sequence number, echoed back but not validated
    pub chunk_index: u64,

    /// Whether the caller marked this as the last chunk of an utterance
    #[serde(default)]
    pub is_final: bool,

    /// Duration of the source audio, if the client reports it
    #[serde(default)]
    pub audio_duration_ms: Option<u64>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Durable per-caller record of transcript history and extraction results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    pub person_id: String,

    pub call_started_at: DateTime<Utc>,

    pub call_ended_at: Option<DateTime<Utc>>,

    /// False once the caller has ended the call
    pub is_active: bool,

    /// Every chunk received, in arrival order
    pub transcript_chunks: Vec<TranscriptChunk>,

    /// Most recent extraction result
    pub extracted_info: Option<ExtractedInfo>,

    /// Every extraction result ever produced for this caller
    pub extraction_history: Vec<ExtractedInfo>,

    pub updated_at: DateTime<Utc>,
}

impl PersonRecord {
    pub fn new(person_id: &str) -> Self {
        let now = Utc::now();
        Self {
            person_id: person_id.to_string(),
            call_started_at: now,
            call_ended_at: None,
            is_active: true,
            transcript_chunks: Vec::new(),
            extracted_info: None,
            extraction_history: Vec::new(),
            updated_at: now,
        }
    }

    /// The caller's complete transcript: all chunk text in arrival order,
    /// joined with single spaces.
    pub fn full_transcript(&self) -> String {
        self.transcript_chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
