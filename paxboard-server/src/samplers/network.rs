use async_trait::async_trait;
use paxboard_shared::metrics::NetworkStats;
use paxboard_shared::{Channel, Sample};
use std::time::Instant;
use sysinfo::Networks;

use super::{Sampler, blocking};
use crate::error::SampleError;
use crate::rate::RateTracker;
use crate::util::units::format_rate;

const LOOPBACK: &str = "lo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

pub struct NetworkSampler {
    rates: RateTracker,
}

impl NetworkSampler {
    pub fn new() -> Self {
        Self {
            rates: RateTracker::new(),
        }
    }

    /// Applies the rate tracker to one reading of all interface counters.
    /// Loopback is dropped and interfaces are ordered by name.
    pub fn network_stats(
        &mut self,
        counters: Vec<InterfaceCounters>,
        now: Instant,
    ) -> Vec<NetworkStats> {
        let mut counters: Vec<_> = counters
            .into_iter()
            .filter(|c| c.interface != LOOPBACK)
            .collect();
        counters.sort_by(|a, b| a.interface.cmp(&b.interface));

        counters
            .into_iter()
            .map(|c| {
                let (rx, tx) = self.rates.observe(&c.interface, c.rx_bytes, c.tx_bytes, now);
                NetworkStats {
                    interface: c.interface,
                    rx_bytes: c.rx_bytes,
                    tx_bytes: c.tx_bytes,
                    rx_rate: format_rate(rx),
                    tx_rate: format_rate(tx),
                }
            })
            .collect()
    }
}

impl Default for NetworkSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for NetworkSampler {
    fn channel(&self) -> Channel {
        Channel::Network
    }

    async fn sample(&mut self) -> Result<Sample, SampleError> {
        let (counters, now) = blocking(Channel::Network, || {
            let networks = Networks::new_with_refreshed_list();
            let counters: Vec<_> = networks
                .iter()
                .map(|(name, data)| InterfaceCounters {
                    interface: name.to_string(),
                    rx_bytes: data.total_received(),
                    tx_bytes: data.total_transmitted(),
                })
                .collect();
            (counters, Instant::now())
        })
        .await?;

        Ok(Sample::Network(self.network_stats(counters, now)))
    }
}
