//! WebSocket chat endpoint
//!
//! One socket per conversation: the session is created on connect, the
//! welcome message is pushed immediately and every inbound text message
//! runs one orchestrated turn.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::session::Session;
use crate::state::AppState;

/// WebSocket protocol messages.
///
/// `message` goes both ways: the client only needs `content`, the server
/// fills in `session_id` and `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    Message {
        #[serde(default)]
        session_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
        #[serde(default)]
        timestamp: i64,
    },
    Ping,
    Pong,
    EndSession,
    Connected {
        session_id: String,
    },
    Error {
        message: String,
    },
}

type WsSender = Arc<Mutex<futures::stream::SplitSink<WebSocket, Message>>>;

async fn send(sender: &WsSender, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let mut s = sender.lock().await;
            if let Err(e) = s.send(Message::Text(json)).await {
                tracing::debug!("Failed to send WebSocket message: {}", e);
            }
        }
        Err(e) => tracing::error!("Failed to serialize WebSocket message: {}", e),
    }
}

fn outbound_message(session_id: &str, content: String) -> WsMessage {
    WsMessage::Message {
        session_id: session_id.to_string(),
        content,
        metadata: None,
        timestamp: chrono::Utc::now().timestamp_millis(),
    }
}

/// Upgrade handler for `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let sender: WsSender = Arc::new(Mutex::new(sender));

    let session_id = Uuid::new_v4().to_string();

    let (session_state, welcome) = match state.orchestrator.start_session(&session_id).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(session_id, error = %e, "Failed to start session");
            send(
                &sender,
                &WsMessage::Error {
                    message: "Failed to start session".to_string(),
                },
            )
            .await;
            return;
        }
    };

    let session: Arc<Session> = match state.sessions.insert(session_state) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(session_id, error = %e, "Session rejected");
            send(&sender, &WsMessage::Error { message: e.to_string() }).await;
            return;
        }
    };

    tracing::info!(session_id = %session.id, "WebSocket connected");

    send(
        &sender,
        &WsMessage::Connected {
            session_id: session.id.clone(),
        },
    )
    .await;
    send(&sender, &outbound_message(&session.id, welcome)).await;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                // Non-JSON frames are treated as a bare chat message
                let parsed: WsMessage = serde_json::from_str(&text).unwrap_or(WsMessage::Message {
                    session_id: String::new(),
                    content: text,
                    metadata: None,
                    timestamp: 0,
                });

                match parsed {
                    // Empty or garbled content still runs a turn; the
                    // analyzer's fallback owns degraded input.
                    WsMessage::Message {
                        content, metadata, ..
                    } => {
                        session.touch();
                        process_message(&state, &session, &sender, &content, metadata).await;
                    }
                    WsMessage::Ping => {
                        send(&sender, &WsMessage::Pong).await;
                    }
                    WsMessage::EndSession => {
                        session.close();
                        break;
                    }
                    _ => {}
                }
            }
            Ok(Message::Ping(data)) => {
                let mut s = sender.lock().await;
                let _ = s.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::error!(session_id = %session.id, "WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    state.sessions.remove(&session.id);
    tracing::info!(session_id = %session.id, "WebSocket closed");
}

/// Run one turn. The session state lock serializes turns per session.
async fn process_message(
    state: &AppState,
    session: &Arc<Session>,
    sender: &WsSender,
    content: &str,
    metadata: Option<serde_json::Value>,
) {
    let mut session_state = session.state.lock().await;

    match state
        .orchestrator
        .handle_message(content, metadata, &session_state)
        .await
    {
        Ok(handled) => {
            *session_state = handled.updated_session;
            drop(session_state);

            send(sender, &outbound_message(&session.id, handled.response)).await;

            // The reply already went out; persistence trouble is reported
            // as a separate event.
            if let Some(error) = handled.persistence_error {
                send(
                    sender,
                    &WsMessage::Error {
                        message: format!("Failed to save conversation: {}", error),
                    },
                )
                .await;
            }
        }
        Err(e) => {
            drop(session_state);
            tracing::error!(session_id = %session.id, error = %e, "Turn failed");
            send(
                sender,
                &WsMessage::Error {
                    message: "Failed to process message".to_string(),
                },
            )
            .await;
        }
    }
}
