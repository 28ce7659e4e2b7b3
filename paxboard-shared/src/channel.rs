use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A named metric stream. The wire names are part of the client contract.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Cpu,
    Memory,
    Disks,
    Gpus,
    Network,
    AiServices,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Cpu,
        Channel::Memory,
        Channel::Disks,
        Channel::Gpus,
        Channel::Network,
        Channel::AiServices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Cpu => "cpu",
            Channel::Memory => "memory",
            Channel::Disks => "disks",
            Channel::Gpus => "gpus",
            Channel::Network => "network",
            Channel::AiServices => "aiServices",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChannel(pub String);

impl fmt::Display for UnknownChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown channel: {}", self.0)
    }
}

impl std::error::Error for UnknownChannel {}

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}
