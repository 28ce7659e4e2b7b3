//! The channel catalog: which channels exist, who samples them, how often.

use paxboard_shared::Channel;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

use crate::config::AppConfig;
use crate::error::RegistryError;
use crate::samplers::{
    AiServicesSampler, CpuSampler, DiskSampler, GpuSampler, MemorySampler, NetworkSampler, Sampler,
};

pub struct ChannelSpec {
    pub channel: Channel,
    pub sampler: Box<dyn Sampler>,
    pub interval: Duration,
}

#[derive(Default)]
pub struct MetricRegistry {
    specs: Vec<ChannelSpec>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard catalog. Disabled channels are left out, and
    /// `aiServices` only exists when a proxy URL is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        for channel in Channel::ALL {
            let Some(interval) = config.interval_for(channel) else {
                info!("Channel {channel} disabled");
                continue;
            };
            let sampler: Box<dyn Sampler> = match channel {
                Channel::Cpu => Box::new(CpuSampler::new()),
                Channel::Memory => Box::new(MemorySampler::new()),
                Channel::Disks => Box::new(DiskSampler::new(config.disk_paths.clone())),
                Channel::Gpus => Box::new(GpuSampler::new()),
                Channel::Network => Box::new(NetworkSampler::new()),
                Channel::AiServices => match &config.large_model_proxy_url {
                    Some(url) => Box::new(AiServicesSampler::new(url.clone())),
                    None => continue,
                },
            };
            registry.register(sampler, interval)?;
        }

        Ok(registry)
    }

    /// Adds a channel. Channels are immutable once registered.
    pub fn register(
        &mut self,
        sampler: Box<dyn Sampler>,
        interval: Duration,
    ) -> Result<&mut Self, RegistryError> {
        let channel = sampler.channel();
        if self.contains(channel) {
            return Err(RegistryError::Duplicate(channel));
        }
        if interval.is_zero() {
            return Err(RegistryError::ZeroInterval(channel));
        }
        self.specs.push(ChannelSpec {
            channel,
            sampler,
            interval,
        });
        Ok(self)
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.specs.iter().any(|s| s.channel == channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.specs.iter().map(|s| s.channel)
    }

    /// `{channel: intervalMillis}`
    pub fn intervals(&self) -> BTreeMap<Channel, u64> {
        self.specs
            .iter()
            .map(|s| (s.channel, s.interval.as_millis() as u64))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn into_specs(self) -> Vec<ChannelSpec> {
        self.specs
    }
}
