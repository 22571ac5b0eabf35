//! Status WebSocket
//!
//! Each client gets the current snapshot on connect and then every change.
//! Snapshots come from a `watch` receiver, so a slow client skips
//! intermediate states instead of queueing them. Clients may also ask for a
//! device ping:
//!
//! ```json
//! {"type": "ping_indicator"}
//! {"type": "ping_lighting"}
//! ```

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use portal_core::StatusSnapshot;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::AppState;

/// Message from a client
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    PingIndicator,
    PingLighting,
}

/// Message to a client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    StatusUpdate {
        data: StatusSnapshot,
    },
    IndicatorPingResponse {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    LightingPingResponse {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

type WsSender = futures::stream::SplitSink<WebSocket, Message>;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut status_rx = state.engine.subscribe();
    info!("WebSocket client connected");

    state.engine.refresh_health().await;
    let initial = status_rx.borrow_and_update().clone();
    if send_message(&mut sender, &OutgoingMessage::StatusUpdate { data: initial })
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let data = status_rx.borrow_and_update().clone();
                if send_message(&mut sender, &OutgoingMessage::StatusUpdate { data }).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Some(reply) = handle_text(&state, &text).await else {
                            continue;
                        };
                        if send_message(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

async fn handle_text(state: &AppState, text: &str) -> Option<OutgoingMessage> {
    let message: IncomingMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "Ignoring WebSocket message: {}", text);
            return None;
        }
    };
    Some(answer(state, message).await)
}

async fn answer(state: &AppState, message: IncomingMessage) -> OutgoingMessage {
    match message {
        IncomingMessage::PingIndicator => match state.engine.indicator_state().await {
            Some(report) => OutgoingMessage::IndicatorPingResponse {
                success: true,
                state: Some(report.state),
                error: None,
                timestamp: Utc::now(),
            },
            None => OutgoingMessage::IndicatorPingResponse {
                success: false,
                state: None,
                error: Some("Failed to connect to indicator".to_string()),
                timestamp: Utc::now(),
            },
        },
        IncomingMessage::PingLighting => {
            let healthy = match state.engine.lighting() {
                Some(lighting) => lighting.health_check().await,
                None => false,
            };
            OutgoingMessage::LightingPingResponse {
                success: healthy,
                error: (!healthy).then(|| "Lighting controller not responding".to_string()),
                timestamp: Utc::now(),
            }
        }
    }
}

async fn send_message(sender: &mut WsSender, msg: &OutgoingMessage) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sender
        .send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
