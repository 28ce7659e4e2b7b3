use anyhow::{Context, Result};
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use paxboard_shared::Channel;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::stream::stats_ws;
use crate::util::app_state::AppState;

async fn get_status() -> impl IntoResponse {
    "ok".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelView {
    channel: Channel,
    interval_millis: u64,
    has_sample: bool,
    subscribers: usize,
}

async fn get_channels(State(state): State<AppState>) -> Json<Vec<ChannelView>> {
    let views = state
        .hub
        .catalog()
        .await
        .into_iter()
        .map(|info| ChannelView {
            channel: info.channel,
            interval_millis: info.interval.as_millis() as u64,
            has_sample: info.has_sample,
            subscribers: info.subscribers,
        })
        .collect();
    Json(views)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/stats", get(stats_ws))
        .route("/channels", get(get_channels))
        .route("/status", get(get_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Binds the configured address and serves until the hub shuts down.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.bind_address, state.config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Stats server listening on {}", listener.local_addr()?);
    serve_listener(listener, state).await
}

pub async fn serve_listener(listener: TcpListener, state: AppState) -> Result<()> {
    let shutdown = state.hub.shutdown_token();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Stats server failed")?;
    Ok(())
}
