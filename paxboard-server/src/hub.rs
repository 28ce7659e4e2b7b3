//! Per-channel polling and fan-out to subscribed sessions.
//!
//! Each registered channel gets one periodic task. A tick samples, swaps the
//! channel's latest snapshot, encodes it once and offers the frame to every
//! subscriber's bounded outbox. A session whose outbox is full or closed is
//! torn down; nothing a session does can stall a channel.
//!
//! Shared state:
//! - `latest` per channel: `ArcSwapOption`, replaced wholesale.
//! - `subscribers` per channel: copied under the read lock before delivery;
//!   `latest` is swapped while that lock is held.
//! - `sessions`: removal from this map is the point a session stops existing
//!   for every broadcast, in progress or later.

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use paxboard_shared::{Channel, Sample};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{HubError, SampleError};
use crate::registry::MetricRegistry;
use crate::samplers::Sampler;

pub type SessionId = Uuid;

/// One encoded server → client message.
pub type Frame = Arc<str>;

#[derive(Debug, Clone)]
pub struct HubSettings {
    pub sample_timeout: Duration,
    pub session_queue_capacity: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            sample_timeout: Duration::from_secs(5),
            session_queue_capacity: 64,
        }
    }
}

impl HubSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sample_timeout: config.sample_timeout(),
            session_queue_capacity: config.session_queue_capacity,
        }
    }
}

struct Snapshot {
    sample: Sample,
    frame: Frame,
}

struct ChannelSlot {
    interval: Duration,
    // also serializes ticks of this channel
    sampler: Mutex<Box<dyn Sampler>>,
    latest: ArcSwapOption<Snapshot>,
    subscribers: RwLock<HashSet<SessionId>>,
}

struct SessionEntry {
    outbox: mpsc::Sender<Frame>,
    closed: CancellationToken,
}

/// What the transport needs to drive one connection.
pub struct SessionHandle {
    pub id: SessionId,
    pub frames: mpsc::Receiver<Frame>,
    /// Cancelled when the hub drops the session or shuts down.
    pub closed: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel: Channel,
    pub interval: Duration,
    pub has_sample: bool,
    pub subscribers: usize,
}

pub struct Hub {
    slots: HashMap<Channel, ChannelSlot>,
    sessions: DashMap<SessionId, SessionEntry>,
    settings: HubSettings,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Hub {
    pub fn new(registry: MetricRegistry, settings: HubSettings) -> Arc<Self> {
        let slots = registry
            .into_specs()
            .into_iter()
            .map(|spec| {
                (
                    spec.channel,
                    ChannelSlot {
                        interval: spec.interval,
                        sampler: Mutex::new(spec.sampler),
                        latest: ArcSwapOption::empty(),
                        subscribers: RwLock::new(HashSet::new()),
                    },
                )
            })
            .collect();

        Arc::new(Self {
            slots,
            sessions: DashMap::new(),
            settings,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawns one polling task per channel. Calling it again is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            return;
        }
        for (channel, slot) in &self.slots {
            info!("Polling {channel} every {:?}", slot.interval);
            tasks.push(tokio::spawn(
                self.clone().run_channel(*channel, slot.interval),
            ));
        }
    }

    /// Stops every polling task and closes every session.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            let _ = task.await;
        }
        info!("Hub stopped");
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    async fn run_channel(self: Arc<Self>, channel: Channel, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                res = self.poll(channel) => match res {
                    Ok(delivered) => debug!(%channel, delivered, "tick"),
                    Err(e) => warn!("Skipping {channel} tick: {e}"),
                },
            }
        }
        debug!(%channel, "polling stopped");
    }

    /// Runs one tick of `channel`: sample, store, deliver.
    ///
    /// On failure the previous snapshot stays in place and nothing is sent.
    /// Returns how many sessions the new sample was handed to.
    pub async fn poll(&self, channel: Channel) -> Result<usize, HubError> {
        let slot = self
            .slots
            .get(&channel)
            .ok_or(HubError::UnknownChannel(channel))?;

        let mut sampler = slot.sampler.lock().await;
        let timeout = self.settings.sample_timeout;
        let sample = match tokio::time::timeout(timeout, sampler.sample()).await {
            Ok(result) => result?,
            Err(_) => return Err(SampleError::Timeout { channel, timeout }.into()),
        };
        if sample.channel() != channel {
            return Err(SampleError::Task {
                channel,
                message: format!("sampler produced a {} sample", sample.channel()),
            }
            .into());
        }

        let frame: Frame = serde_json::to_string(&sample)?.into();

        // a subscriber either saw the previous snapshot and is in this set, or
        // joined after it and got this frame as its snapshot; never both
        let subscribers: Vec<SessionId> = {
            let subscribers = slot.subscribers.read().await;
            slot.latest.store(Some(Arc::new(Snapshot {
                sample,
                frame: frame.clone(),
            })));
            subscribers.iter().copied().collect()
        };

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for id in subscribers {
            match self.offer(id, &frame) {
                Offer::Sent => delivered += 1,
                Offer::Gone => {}
                Offer::Failed => dropped.push(id),
            }
        }
        drop(sampler);

        for id in dropped {
            self.remove_session(id).await;
        }
        Ok(delivered)
    }

    fn offer(&self, id: SessionId, frame: &Frame) -> Offer {
        let Some(entry) = self.sessions.get(&id) else {
            return Offer::Gone;
        };
        match entry.outbox.try_send(frame.clone()) {
            Ok(()) => Offer::Sent,
            Err(TrySendError::Full(_)) => {
                warn!(session = %id, "Outbox full, dropping slow session");
                Offer::Failed
            }
            Err(TrySendError::Closed(_)) => Offer::Failed,
        }
    }

    pub fn register_session(&self) -> SessionHandle {
        let id = Uuid::new_v4();
        let (outbox, frames) = mpsc::channel(self.settings.session_queue_capacity);
        let closed = self.shutdown.child_token();
        self.sessions.insert(
            id,
            SessionEntry {
                outbox,
                closed: closed.clone(),
            },
        );
        debug!(session = %id, "session registered");
        SessionHandle { id, frames, closed }
    }

    /// Adds the session to `channel` and hands it the latest snapshot right
    /// away. Returns `false` for channels that are not registered and for
    /// sessions that no longer exist.
    pub async fn subscribe(&self, id: SessionId, channel: Channel) -> bool {
        let Some(slot) = self.slots.get(&channel) else {
            return false;
        };

        let offered = {
            let mut subscribers = slot.subscribers.write().await;
            if !self.sessions.contains_key(&id) {
                return false;
            }
            if !subscribers.insert(id) {
                return true;
            }
            // sent under the write lock so a concurrent tick cannot overtake it
            match slot.latest.load_full() {
                Some(snapshot) => self.offer(id, &snapshot.frame),
                None => Offer::Sent,
            }
        };

        if matches!(offered, Offer::Failed) {
            self.remove_session(id).await;
            return false;
        }
        debug!(session = %id, %channel, "subscribed");
        true
    }

    /// Stops future deliveries of `channel`. Frames already queued still go out.
    pub async fn unsubscribe(&self, id: SessionId, channel: Channel) -> bool {
        match self.slots.get(&channel) {
            Some(slot) => slot.subscribers.write().await.remove(&id),
            None => false,
        }
    }

    /// Tears the session down: it leaves every channel and its transport is
    /// told to close. Safe to call more than once.
    pub async fn remove_session(&self, id: SessionId) {
        let Some((_, entry)) = self.sessions.remove(&id) else {
            return;
        };
        entry.closed.cancel();
        for slot in self.slots.values() {
            slot.subscribers.write().await.remove(&id);
        }
        debug!(session = %id, "session removed");
    }

    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<_> = self.slots.keys().copied().collect();
        channels.sort();
        channels
    }

    pub fn latest(&self, channel: Channel) -> Option<Sample> {
        self.slots
            .get(&channel)?
            .latest
            .load_full()
            .map(|s| s.sample.clone())
    }

    pub async fn subscriber_count(&self, channel: Channel) -> usize {
        match self.slots.get(&channel) {
            Some(slot) => slot.subscribers.read().await.len(),
            None => 0,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub async fn catalog(&self) -> Vec<ChannelInfo> {
        let mut infos = Vec::with_capacity(self.slots.len());
        for channel in self.channels() {
            let slot = &self.slots[&channel];
            infos.push(ChannelInfo {
                channel,
                interval: slot.interval,
                has_sample: slot.latest.load().is_some(),
                subscribers: slot.subscribers.read().await.len(),
            });
        }
        infos
    }
}

enum Offer {
    Sent,
    Gone,
    Failed,
}
