use super::state::AppState;
use crate::protocol::{ClientMessage, Envelope, ServerMessage};
use crate::registry::Outbound;
use axum::{
    extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub active_connections: usize,
}

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        active_connections: state.registry.active_connections().await,
    };
    (StatusCode::OK, Json(response))
}

/// GET /ws/call/:person_id
/// Upgrade to a WebSocket and run the caller's session until it ends
pub async fn ws_call(
    State(state): State<AppState>,
    Path(person_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, person_id))
}

/// Run one caller session: register with the registry, then pump the
/// socket with a writer task (outbound channel -> socket) and a reader
/// task (socket -> processor) until either side finishes.
async fn handle_socket(socket: WebSocket, state: AppState, person_id: String) {
    info!("WebSocket connected for {}", person_id);

    let (ws_tx, ws_rx) = socket.split();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Outbound>();

    let connection_id = state.registry.connect(&person_id, out_tx).await;

    let mut writer = tokio::spawn(write_loop(ws_tx, out_rx, person_id.clone()));
    let mut reader = tokio::spawn(read_loop(ws_rx, state.clone(), person_id.clone()));

    // Whichever side finishes first ends the session. The writer finishes
    // on a close signal (replaced or swept); the reader finishes when the
    // client goes away.
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    // No-op if this session was already replaced by a newer connection.
    state.registry.disconnect(&person_id, connection_id).await;
    info!("WebSocket session ended for {}", person_id);
}

/// Drain the outbound channel into the socket until the channel closes, a
/// send fails, or a close signal arrives.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::UnboundedReceiver<Outbound>,
    person_id: String,
) {
    while let Some(outbound) = out_rx.recv().await {
        match outbound {
            Outbound::Message(message) => {
                match serde_json::to_string(&Envelope::new(message)) {
                    Ok(json) => {
                        if ws_tx.send(Message::Text(json)).await.is_err() {
                            debug!("Socket write failed for {}", person_id);
                            break;
                        }
                    }
                    Err(err) => {
                        error!("Failed to serialize message for {}: {}", person_id, err);
                    }
                }
            }
            Outbound::Close { reason } => {
                debug!("Closing socket for {}: {}", person_id, reason);
                let _ = ws_tx
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: reason.into(),
                    })))
                    .await;
                break;
            }
        }
    }
}

/// Process inbound frames strictly in order for this caller. A malformed
/// frame gets an error reply and the loop continues; transport errors and
/// close frames end the session.
async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    state: AppState,
    person_id: String,
) {
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<Envelope<ClientMessage>>(&text) {
                    Ok(envelope) => {
                        state
                            .processor
                            .process_message(&person_id, envelope.message)
                            .await;
                    }
                    Err(err) => {
                        warn!("Malformed message from {}: {}", person_id, err);
                        state
                            .registry
                            .send_to_person(
                                &person_id,
                                ServerMessage::error("Malformed message", "invalid_message"),
                            )
                            .await;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket closed by {}", person_id);
                break;
            }
            // Pings are answered by axum; binary frames are not part of
            // the protocol.
            Ok(_) => {}
            Err(err) => {
                warn!("WebSocket error for {}: {}", person_id, err);
                break;
            }
        }
    }
}
