use anyhow::Context;
use paxboard_server::{config::AppConfig, run, util::logging::init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");
    let config = AppConfig::load().context("Failed to load configuration")?;
    run(config).await
}
