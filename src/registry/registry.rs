use super::connection::{ConnectionHandle, Outbound};
use crate::model::TranscriptChunk;
use crate::protocol::ServerMessage;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Registry of live caller connections
///
/// A single mutex guards the connection map. Methods never hold it across
/// socket I/O: sends go through each connection's outbound channel, and
/// broadcast iterates a snapshot taken under the lock.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Register a connection for a caller, closing and evicting any
    /// previous one. Sends `connection_ack` to the new socket and returns
    /// the connection id the session should pass back to `disconnect`.
    pub async fn connect(&self, person_id: &str, sender: mpsc::UnboundedSender<Outbound>) -> Uuid {
        let handle = ConnectionHandle::new(person_id, sender.clone());
        let connection_id = handle.connection_id;

        {
            let mut connections = self.connections.lock().await;
            if let Some(old) = connections.insert(person_id.to_string(), handle) {
                info!("Replacing existing connection for {}", person_id);
                let _ = old.sender.send(Outbound::Close {
                    reason: "replaced by new connection".to_string(),
                });
            }
            info!(
                "Connection registered for {} ({} active)",
                person_id,
                connections.len()
            );
        }

        let _ = sender.send(Outbound::Message(ServerMessage::connection_ack(person_id)));
        connection_id
    }

    /// Remove the caller's connection if it is still the one identified by
    /// `connection_id`. A session that was replaced must not evict its
    /// replacement. Idempotent.
    pub async fn disconnect(&self, person_id: &str, connection_id: Uuid) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.get(person_id) {
            Some(conn) if conn.connection_id == connection_id => {
                connections.remove(person_id);
                info!(
                    "Connection removed for {} ({} active)",
                    person_id,
                    connections.len()
                );
                true
            }
            _ => false,
        }
    }

    /// Best-effort unicast. False when the caller is absent or the send
    /// fails; never an error.
    pub async fn send_to_person(&self, person_id: &str, message: ServerMessage) -> bool {
        let connections = self.connections.lock().await;
        match connections.get(person_id) {
            Some(conn) => conn.sender.send(Outbound::Message(message)).is_ok(),
            None => false,
        }
    }

    /// Send a message to every connection, returning how many sends
    /// succeeded. Iterates a snapshot so connects and disconnects during
    /// the fan-out cannot corrupt the loop; per-connection failures are
    /// counted and swallowed.
    pub async fn broadcast(&self, message: ServerMessage) -> usize {
        let senders: Vec<(String, mpsc::UnboundedSender<Outbound>)> = {
            let connections = self.connections.lock().await;
            connections
                .iter()
                .map(|(id, conn)| (id.clone(), conn.sender.clone()))
                .collect()
        };

        let mut sent = 0;
        for (person_id, sender) in senders {
            if sender.send(Outbound::Message(message.clone())).is_ok() {
                sent += 1;
            } else {
                warn!("Broadcast send failed for {}", person_id);
            }
        }

        debug!("Broadcast delivered to {} connections", sent);
        sent
    }

    /// Record a heartbeat for the caller. False if no connection exists.
    pub async fn update_heartbeat(&self, person_id: &str) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.get_mut(person_id) {
            Some(conn) => {
                conn.last_heartbeat = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Callers whose last heartbeat is older than `timeout`.
    pub async fn check_stale(&self, timeout: Duration) -> Vec<String> {
        let cutoff = ChronoDuration::milliseconds(timeout.as_millis() as i64);
        let now = Utc::now();
        let connections = self.connections.lock().await;
        connections
            .values()
            .filter(|conn| now.signed_duration_since(conn.last_heartbeat) > cutoff)
            .map(|conn| conn.person_id.clone())
            .collect()
    }

    /// Close and evict every stale connection, returning how many.
    pub async fn close_stale(&self, timeout: Duration) -> usize {
        let stale = self.check_stale(timeout).await;
        let mut closed = 0;

        let mut connections = self.connections.lock().await;
        for person_id in stale {
            if let Some(conn) = connections.remove(&person_id) {
                info!("Closing stale connection for {}", person_id);
                let _ = conn.sender.send(Outbound::Close {
                    reason: "heartbeat timeout".to_string(),
                });
                closed += 1;
            }
        }
        closed
    }

    /// Append a chunk to the caller's buffer, returning the new buffer
    /// length. None if the caller has no connection.
    pub async fn push_chunk(&self, person_id: &str, chunk: TranscriptChunk) -> Option<usize> {
        let mut connections = self.connections.lock().await;
        match connections.get_mut(person_id) {
            Some(conn) => {
                conn.chunk_buffer.push(chunk);
                Some(conn.chunk_buffer.len())
            }
            None => None,
        }
    }

    /// Take and clear the caller's buffered chunks. Empty if the caller has
    /// no connection or nothing buffered.
    pub async fn take_buffer(&self, person_id: &str) -> Vec<TranscriptChunk> {
        let mut connections = self.connections.lock().await;
        match connections.get_mut(person_id) {
            Some(conn) => std::mem::take(&mut conn.chunk_buffer),
            None => Vec::new(),
        }
    }

    /// Buffered chunk count for the caller, if connected.
    pub async fn buffer_len(&self, person_id: &str) -> Option<usize> {
        let connections = self.connections.lock().await;
        connections.get(person_id).map(|conn| conn.chunk_buffer.len())
    }

    pub async fn active_connections(&self) -> usize {
        let connections = self.connections.lock().await;
        connections.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the periodic sweep that closes connections whose heartbeat has
/// gone silent longer than `timeout`. Abort the handle at shutdown.
pub fn spawn_sweep(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let closed = registry.close_stale(timeout).await;
            if closed > 0 {
                info!("Heartbeat sweep closed {} stale connections", closed);
            }
        }
    })
}
