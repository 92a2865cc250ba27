//! services/companion/src/web/ws_handler.rs
//!
//! The WebSocket entry point: forwards companion events to the client and runs
//! streamed chat sends on its behalf.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde::Serialize;
use std::sync::Arc;
use study_companion_core::{Companion, ConsultRequest};
use tokio::sync::{broadcast::error::RecvError, mpsc, Mutex};
use tracing::{error, info, warn};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn send_json<T: Serialize>(sender: &WsSender, payload: &T) -> bool {
    match serde_json::to_string(payload) {
        Ok(json) => sender.lock().await.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            error!("Failed to encode WebSocket payload: {}", e);
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established");
    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Event feed ---
    let feed = {
        let mut events = app_state.companion.subscribe();
        let ws_sender = ws_sender.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if !send_json(&ws_sender, &event).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("WebSocket client lagged; {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    // --- 2. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let message = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed client message: {}", e);
                send_json(&ws_sender, &ServerMessage::Error { message: format!("Invalid message: {}", e) }).await;
                continue;
            }
        };

        match message {
            ClientMessage::SendMessage { session_id, text, attachments, deep_reasoning } => {
                let companion = app_state.companion.clone();
                match companion.begin_message(&session_id, &text, attachments, deep_reasoning).await {
                    Ok(request) => {
                        let ws_sender = ws_sender.clone();
                        tokio::spawn(async move {
                            stream_reply(companion, ws_sender, session_id, request).await;
                        });
                    }
                    Err(e) => {
                        send_json(&ws_sender, &ServerMessage::Error { message: e.to_string() }).await;
                    }
                }
            }
            ClientMessage::SelectSession { session_id } => {
                if let Err(e) = app_state.companion.select_session(&session_id).await {
                    send_json(&ws_sender, &ServerMessage::Error { message: e.to_string() }).await;
                }
            }
        }
    }

    feed.abort();
    info!("WebSocket connection closed");
}

/// Streams one reply to the client while the companion records it.
async fn stream_reply(
    companion: Arc<Companion>,
    ws_sender: WsSender,
    session_id: String,
    request: ConsultRequest,
) {
    let (chunks, mut deltas) = mpsc::unbounded_channel::<String>();
    let forward = {
        let session_id = session_id.clone();
        tokio::spawn(async move {
            while let Some(delta) = deltas.recv().await {
                let chunk_msg = ServerMessage::ReplyChunk { session_id: session_id.clone(), delta };
                if !send_json(&ws_sender, &chunk_msg).await {
                    break;
                }
            }
        })
    };

    if let Err(e) = companion.stream_message(&session_id, &request, chunks).await {
        error!("Failed to record reply for session {}: {}", session_id, e);
    }
    let _ = forward.await;
}
