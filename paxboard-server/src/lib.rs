pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod rate;
pub mod registry;
pub mod samplers;
pub mod session;
pub mod util;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::hub::{Hub, HubSettings};
use crate::registry::MetricRegistry;
use crate::util::{app_state::AppState, shutdown::cancel_on_signal};

/// Entrypoint used by `main.rs`: polls every configured channel and serves
/// the stream until Ctrl+C or SIGTERM.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let registry = MetricRegistry::from_config(&config)?;
    let hub = Hub::new(registry, HubSettings::from_config(&config));
    cancel_on_signal(hub.shutdown_token());
    hub.start().await;

    let state = AppState {
        hub: hub.clone(),
        config: Arc::new(config),
    };
    let served = api::serve::serve(state).await;
    hub.shutdown().await;
    served
}
