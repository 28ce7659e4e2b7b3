pub mod ai_services;
pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod memory;
pub mod network;

use async_trait::async_trait;
use paxboard_shared::{Channel, Sample};
use std::sync::{Mutex, MutexGuard, TryLockError};

use crate::error::SampleError;

pub use ai_services::AiServicesSampler;
pub use cpu::CpuSampler;
pub use disk::DiskSampler;
pub use gpu::GpuSampler;
pub use memory::MemorySampler;
pub use network::NetworkSampler;

/// Produces fresh samples for one channel.
///
/// The hub never runs two `sample` calls for the same channel at once, so
/// implementations may keep state across ticks without extra locking.
#[async_trait]
pub trait Sampler: Send {
    fn channel(&self) -> Channel;

    async fn sample(&mut self) -> Result<Sample, SampleError>;
}

/// Runs a blocking collaborator call (sysinfo reads /proc and /sys) off the
/// async workers.
pub(crate) async fn blocking<T, F>(channel: Channel, f: F) -> Result<T, SampleError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SampleError::Task {
            channel,
            message: e.to_string(),
        })
}

/// Takes the collaborator state for one blocking read. A read from an earlier
/// tick that the hub gave up on may still hold it; this tick then fails rather
/// than parking another blocking thread behind it.
pub(crate) fn lock_idle<T>(
    channel: Channel,
    state: &Mutex<T>,
) -> Result<MutexGuard<'_, T>, SampleError> {
    match state.try_lock() {
        Ok(guard) => Ok(guard),
        Err(TryLockError::Poisoned(e)) => Ok(e.into_inner()),
        Err(TryLockError::WouldBlock) => Err(SampleError::Task {
            channel,
            message: "previous read still in flight".to_string(),
        }),
    }
}
