use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::metrics::{AiServicesStatus, CpuStats, DiskStats, GpuStats, MemoryStats, NetworkStats};

/// One snapshot of one channel. Serializes as the server → client frame
/// `{"type": "<channel>", "data": ...}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Sample {
    Cpu(CpuStats),
    Memory(MemoryStats),
    Disks(Vec<DiskStats>),
    Gpus(Vec<GpuStats>),
    Network(Vec<NetworkStats>),
    AiServices(AiServicesStatus),
}

impl Sample {
    pub fn channel(&self) -> Channel {
        match self {
            Sample::Cpu(_) => Channel::Cpu,
            Sample::Memory(_) => Channel::Memory,
            Sample::Disks(_) => Channel::Disks,
            Sample::Gpus(_) => Channel::Gpus,
            Sample::Network(_) => Channel::Network,
            Sample::AiServices(_) => Channel::AiServices,
        }
    }
}

/// Client → server control frame.
///
/// The channel stays a plain string so that a name this server does not know
/// still parses and can be ignored instead of being rejected as malformed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
}
