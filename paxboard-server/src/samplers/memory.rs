use async_trait::async_trait;
use paxboard_shared::metrics::MemoryStats;
use paxboard_shared::{Channel, Sample};
use std::sync::{Arc, Mutex};
use sysinfo::System;

use super::{Sampler, blocking, lock_idle};
use crate::error::SampleError;
use crate::util::units::{bytes_to_gb, usage_percent};

pub struct MemorySampler {
    system: Arc<Mutex<System>>,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for MemorySampler {
    fn channel(&self) -> Channel {
        Channel::Memory
    }

    async fn sample(&mut self) -> Result<Sample, SampleError> {
        let system = self.system.clone();
        let stats = blocking(Channel::Memory, move || -> Result<_, SampleError> {
            let mut sys = lock_idle(Channel::Memory, &system)?;
            sys.refresh_memory();
            Ok(memory_stats(
                sys.total_memory(),
                sys.used_memory(),
                sys.available_memory(),
            ))
        })
        .await??;

        Ok(Sample::Memory(stats))
    }
}

/// Converts byte counts to the wire record. Usage is computed from the raw
/// bytes, not from the rounded GB values.
pub fn memory_stats(total: u64, used: u64, available: u64) -> MemoryStats {
    MemoryStats {
        total: bytes_to_gb(total),
        used: bytes_to_gb(used),
        available: bytes_to_gb(available),
        usage: usage_percent(used as f64, total as f64),
    }
}
