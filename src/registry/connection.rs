use crate::model::TranscriptChunk;
use crate::protocol::ServerMessage;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Instructions handed to a connection's socket writer task
#[derive(Debug)]
pub enum Outbound {
    /// Serialize and send one protocol message
    Message(ServerMessage),

    /// Send a close frame with the given reason and stop writing
    Close { reason: String },
}

/// Book-keeping for one live caller connection
pub struct ConnectionHandle {
    /// Distinguishes this socket from a replacement for the same caller
    pub connection_id: Uuid,

    pub person_id: String,

    /// Feeds the connection's writer task
    pub sender: mpsc::UnboundedSender<Outbound>,

    pub connected_at: DateTime<Utc>,

    pub last_heartbeat: DateTime<Utc>,

    /// Chunks received since the last extraction trigger
    pub chunk_buffer: Vec<TranscriptChunk>,
}

impl ConnectionHandle {
    pub fn new(person_id: &str, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        let now = Utc::now();
        Self {
            connection_id: Uuid::new_v4(),
            person_id: person_id.to_string(),
            sender,
            connected_at: now,
            last_heartbeat: now,
            chunk_buffer: Vec::new(),
        }
    }
}
