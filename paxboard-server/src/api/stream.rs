//! WebSocket endpoint streaming channel samples to the dashboard.
//!
//! Inbound text frames are subscribe/unsubscribe requests; outbound frames are
//! whatever the hub queues for this session. The connection ends on a close
//! frame, a transport error, an idle client, or when the hub drops the session.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info};

use crate::hub::{Hub, SessionHandle};
use crate::session::Session;
use crate::util::app_state::AppState;

pub async fn stats_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let keepalive = state.config.keepalive_interval();
    let idle_timeout = state.config.idle_timeout();
    ws.on_upgrade(move |socket| handle_stats_socket(socket, state.hub, keepalive, idle_timeout))
}

pub async fn handle_stats_socket(
    socket: WebSocket,
    hub: Arc<Hub>,
    keepalive: Duration,
    idle_timeout: Duration,
) {
    let SessionHandle {
        id,
        mut frames,
        closed,
    } = hub.register_session();
    let mut session = Session::new(id);
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut ping = interval_at(Instant::now() + keepalive, keepalive);
    let mut last_seen = Instant::now();
    info!(session = %id, "Client connected");

    loop {
        select! {
            _ = closed.cancelled() => break,
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }
            inbound = ws_rx.next() => {
                last_seen = Instant::now();
                match inbound {
                    Some(Ok(Message::Text(text))) => session.handle_text(&hub, text.as_str()).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    // pings are answered by axum; pongs only refresh last_seen
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(session = %id, "Transport error: {e}");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                if last_seen.elapsed() >= idle_timeout {
                    info!(session = %id, "Client idle for {:?}, closing", idle_timeout);
                    break;
                }
                if ws_tx.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }

    session.close(&hub).await;
    let _ = ws_tx.close().await;
    info!(session = %id, "Client disconnected");
}
