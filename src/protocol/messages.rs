use crate::model::{DisasterSummary, ExtractedInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire envelope wrapped around every message in both directions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(flatten)]
    pub message: T,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl<T> Envelope<T> {
    pub fn new(message: T) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
            message_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Messages a caller sends to the server
///
/// Empty-bodied variants keep braces so `"payload": {}` round-trips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    TranscriptChunk {
        text: String,
        chunk_index: u64,
        #[serde(default)]
        is_final: bool,
        #[serde(default)]
        audio_duration_ms: Option<u64>,
    },
    Heartbeat {},
    CallEnd {},
}

/// Messages the server sends to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck {
        person_id: String,
        status: String,
    },
    ChunkProcessed {
        chunk_index: u64,
        extracted_info: ExtractedInfo,
    },
    SummaryUpdate {
        summary: DisasterSummary,
    },
    HeartbeatAck {},
    Error {
        message: String,
        code: String,
    },
}

impl ServerMessage {
    pub fn connection_ack(person_id: &str) -> Self {
        ServerMessage::ConnectionAck {
            person_id: person_id.to_string(),
            status: "connected".to_string(),
        }
    }

    pub fn chunk_processed(chunk_index: u64, extracted_info: ExtractedInfo) -> Self {
        ServerMessage::ChunkProcessed {
            chunk_index,
            extracted_info,
        }
    }

    pub fn summary_update(summary: DisasterSummary) -> Self {
        ServerMessage::SummaryUpdate { summary }
    }

    pub fn heartbeat_ack() -> Self {
        ServerMessage::HeartbeatAck {}
    }

    pub fn error(message: impl Into<String>, code: &str) -> Self {
        ServerMessage::Error {
            message: message.into(),
            code: code.to_string(),
        }
    }
}
