//! Shared helpers for the stream tests: an in-process server, WebSocket
//! clients, scripted samplers and polling utilities.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use paxboard_server::{
    api::serve::serve_listener,
    config::AppConfig,
    error::SampleError,
    hub::{Hub, HubSettings},
    registry::MetricRegistry,
    samplers::{Sampler, memory::memory_stats},
    util::app_state::AppState,
};
use paxboard_shared::{Channel, Sample};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const GIB: u64 = 1024 * 1024 * 1024;
/// Total memory reported by `CountingMemory`; large enough that the tick
/// counter stored in `used` never reaches it during a test.
pub const TOTAL_GIB: u64 = 4096;

#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("Timeout waiting for {0}")]
    Timeout(String),
}

/// Configuration for wait operations
pub struct WaitConfig {
    pub max_attempts: u32,
    pub interval: Duration,
    pub description: &'static str,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            interval: Duration::from_millis(20),
            description: "condition",
        }
    }
}

impl WaitConfig {
    pub fn with_description(description: &'static str) -> Self {
        Self {
            description,
            ..Default::default()
        }
    }
}

/// Wait for an async condition to become true
pub async fn wait_for<F, Fut>(config: WaitConfig, condition: F) -> Result<(), TestError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..config.max_attempts {
        if condition().await {
            return Ok(());
        }
        sleep(config.interval).await;
    }
    Err(TestError::Timeout(config.description.to_string()))
}

/// Memory sampler whose n-th tick reports `used = n` GiB.
pub struct CountingMemory {
    ticks: Arc<AtomicU64>,
}

impl CountingMemory {
    pub fn new() -> (Self, Arc<AtomicU64>) {
        let ticks = Arc::new(AtomicU64::new(0));
        (
            Self {
                ticks: ticks.clone(),
            },
            ticks,
        )
    }
}

#[async_trait]
impl Sampler for CountingMemory {
    fn channel(&self) -> Channel {
        Channel::Memory
    }

    async fn sample(&mut self) -> Result<Sample, SampleError> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Sample::Memory(memory_stats(
            TOTAL_GIB * GIB,
            n * GIB,
            (TOTAL_GIB - n) * GIB,
        )))
    }
}

/// Tick number carried by a `CountingMemory` sample.
pub fn tick_of(sample: &Sample) -> u64 {
    match sample {
        Sample::Memory(m) => m.used as u64,
        other => panic!("expected a memory sample, got {other:?}"),
    }
}

pub struct TestServer {
    pub hub: Arc<Hub>,
    pub addr: SocketAddr,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    /// Serves `registry` on an ephemeral loopback port. Polling only runs if
    /// `poll` is set; otherwise tests drive ticks with `Hub::poll`.
    pub async fn start(registry: MetricRegistry, poll: bool) -> Self {
        let hub = Hub::new(registry, HubSettings::default());
        if poll {
            hub.start().await;
        }
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState {
            hub: hub.clone(),
            config: Arc::new(AppConfig::default()),
        };
        let task = tokio::spawn(serve_listener(listener, state));
        Self { hub, addr, task }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self) -> Client {
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/stats", self.addr))
            .await
            .unwrap();
        client
    }

    pub async fn stop(self) {
        self.hub.shutdown().await;
        let _ = timeout(Duration::from_secs(5), self.task).await;
    }
}

pub fn memory_registry(interval: Duration) -> (MetricRegistry, Arc<AtomicU64>) {
    let (sampler, ticks) = CountingMemory::new();
    let mut registry = MetricRegistry::new();
    registry.register(Box::new(sampler), interval).unwrap();
    (registry, ticks)
}

pub async fn send_control(client: &mut Client, kind: &str, channel: &str) {
    let frame = serde_json::json!({"type": kind, "channel": channel}).to_string();
    client.send(Message::text(frame)).await.unwrap();
}

pub async fn send_raw(client: &mut Client, frame: &str) {
    client.send(Message::text(frame.to_string())).await.unwrap();
}

/// Next sample frame within `within`, skipping control frames.
/// `None` on timeout or close.
pub async fn next_sample(client: &mut Client, within: Duration) -> Option<Sample> {
    let deadline = Instant::now() + within;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, client.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return Some(serde_json::from_str(text.as_str()).unwrap());
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) | Err(_) => {
                return None;
            }
            Ok(Some(Ok(_))) => continue,
        }
    }
}

/// Every sample that arrives within `within`.
pub async fn collect_samples(client: &mut Client, within: Duration) -> Vec<Sample> {
    let deadline = Instant::now() + within;
    let mut samples = Vec::new();
    while let Some(sample) =
        next_sample(client, deadline.saturating_duration_since(Instant::now())).await
    {
        samples.push(sample);
    }
    samples
}
