use async_trait::async_trait;
use paxboard_shared::metrics::DiskStats;
use paxboard_shared::{Channel, Sample};
use sysinfo::Disks;

use super::{Sampler, blocking};
use crate::error::SampleError;
use crate::util::units::{bytes_to_gb, usage_percent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountUsage {
    pub mount_point: String,
    pub total: u64,
    pub available: u64,
}

/// Reports a fixed set of mount points, in the configured order.
pub struct DiskSampler {
    paths: Vec<String>,
}

impl DiskSampler {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl Sampler for DiskSampler {
    fn channel(&self) -> Channel {
        Channel::Disks
    }

    async fn sample(&mut self) -> Result<Sample, SampleError> {
        let mounts = blocking(Channel::Disks, || {
            Disks::new_with_refreshed_list()
                .list()
                .iter()
                .map(|d| MountUsage {
                    mount_point: d.mount_point().to_string_lossy().into_owned(),
                    total: d.total_space(),
                    available: d.available_space(),
                })
                .collect::<Vec<_>>()
        })
        .await?;

        Ok(Sample::Disks(disk_stats(&self.paths, &mounts)))
    }
}

/// One record per requested path that is mounted; unmounted paths are skipped.
pub fn disk_stats(paths: &[String], mounts: &[MountUsage]) -> Vec<DiskStats> {
    paths
        .iter()
        .filter_map(|path| mounts.iter().find(|m| &m.mount_point == path))
        .map(|m| {
            let used = m.total.saturating_sub(m.available);
            DiskStats {
                path: m.mount_point.clone(),
                total: bytes_to_gb(m.total),
                used: bytes_to_gb(used),
                available: bytes_to_gb(m.available),
                usage: usage_percent(used as f64, m.total as f64),
            }
        })
        .collect()
}
