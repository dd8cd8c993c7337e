//! WebSocket wire protocol
//!
//! JSON envelope `{type, payload, timestamp, message_id?}` with one typed
//! payload per message type:
//! - Inbound: transcript_chunk, heartbeat, call_end
//! - Outbound: connection_ack, chunk_processed, summary_update,
//!   heartbeat_ack, error

mod messages;

pub use messages::{ClientMessage, Envelope, ServerMessage};
