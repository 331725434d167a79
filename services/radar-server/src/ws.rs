//! Realtime subscriber endpoint: upgrades to a WebSocket, admits the
//! connection into the `SubscriberHub`, and pumps the hub's outbound
//! queue to the socket while dispatching inbound commands.
//!
//! Grounded on `services/server/src/ws.rs`'s split reader/writer task
//! shape over an `axum::extract::ws::WebSocket`.

use crate::hub::validate_history_index;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use radar_protocol::{error_codes, Envelope, WsMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Maximum size of a single inbound text frame, per §6's transport guard.
const MAX_INBOUND_MESSAGE_BYTES: usize = 512 * 1024;
/// Native WS ping cadence, distinct from the hub's own JSON `ping` broadcast.
const TRANSPORT_PING_INTERVAL: Duration = Duration::from_secs(30);
/// How long a pong may take to arrive before the connection is dropped.
const TRANSPORT_PONG_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn upgrade(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(MAX_INBOUND_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle(socket, state, addr.to_string()))
}

async fn handle(socket: WebSocket, state: AppState, remote_addr: String) {
    let (mut sink, mut stream) = socket.split();
    let (id, mut outbound) = state.hub.admit(remote_addr).await;

    if let Some(frame) = state.current_frame().await {
        state.hub.send_initial_snapshot(id, &frame).await;
    }

    let last_pong = Arc::new(Mutex::new(Instant::now()));

    let writer_hub = state.hub.clone();
    let writer_last_pong = last_pong.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(TRANSPORT_PING_INTERVAL);
        ping_interval.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                maybe_msg = outbound.recv() => {
                    let Some(text) = maybe_msg else {
                        break;
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    let elapsed = writer_last_pong.lock().await.elapsed();
                    if elapsed > TRANSPORT_PONG_TIMEOUT {
                        debug!(subscriber = %id, "transport pong deadline exceeded, closing");
                        break;
                    }
                    if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        writer_hub.evict(id).await;
    });

    let reader_state = state.clone();
    let reader_last_pong = last_pong;
    let mut reader = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(_) => break,
            };
            match msg {
                Message::Text(text) => dispatch(&reader_state, id, &text).await,
                Message::Pong(_) => {
                    *reader_last_pong.lock().await = Instant::now();
                }
                Message::Close(_) => break,
                Message::Ping(_) | Message::Binary(_) => {}
            }
        }
        reader_state.hub.evict(id).await;
    });

    tokio::select! {
        _ = &mut writer => { reader.abort(); }
        _ = &mut reader => { writer.abort(); }
    }
}

async fn dispatch(state: &AppState, id: uuid::Uuid, text: &str) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(_) => {
            state.hub.send_error(id, error_codes::INVALID_FORMAT, "could not parse message").await;
            return;
        }
    };

    match envelope.message {
        WsMessage::GetStatus(_) => {
            let status = state.current_status().await;
            state.hub.send_status(id, &status).await;
        }
        WsMessage::GetHistory(req) => match validate_history_index(req.index) {
            Ok(index) => {
                let channel = index + 1; // store keys are 1-based
                let points = {
                    let mut store = state.store.clone();
                    store.get_channel_history(channel).await
                };
                // Falls back to the in-memory mirror on store unavailability,
                // per §7, same as the HTTP surface's equivalent endpoint.
                let points = match points {
                    Ok(points) => points,
                    Err(_) => state.channel_history_snapshot(channel).await.unwrap_or_default(),
                };
                let history = points
                    .into_iter()
                    .map(|p| radar_protocol::HistorySample { value: p.value, timestamp: p.timestamp_ms })
                    .collect();
                state.hub.send_history(id, index, history).await;
            }
            Err((code, message)) => state.hub.send_error(id, code, &message).await,
        },
        WsMessage::ClientPing(ping) => state.hub.send_pong(id, ping.time).await,
        _ => {
            state
                .hub
                .send_error(id, error_codes::INVALID_FORMAT, "unexpected message type from subscriber")
                .await;
        }
    }
}
