use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    /// Percent, one decimal.
    pub usage: f64,
    /// Celsius, `None` when no package sensor is exposed.
    pub temperature: Option<f64>,
    pub cores: usize,
    pub core_stats: Vec<CoreStats>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CoreStats {
    pub core: usize,
    pub mhz: u64,
    pub usage: f64,
}

/// Sizes in GB (two decimals), usage in percent (one decimal).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemoryStats {
    pub total: f64,
    pub used: f64,
    pub available: f64,
    pub usage: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DiskStats {
    pub path: String,
    pub total: f64,
    pub used: f64,
    pub available: f64,
    pub usage: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GpuStats {
    pub name: String,
    pub temperature: f64,
    pub utilization: f64,
    /// MB
    pub memory_used: f64,
    /// MB
    pub memory_total: f64,
    pub memory_usage: f64,
    /// Watts
    pub power_draw: f64,
    pub power_limit: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    /// Human readable, e.g. "1.5 MB/s"
    pub rx_rate: String,
    pub tx_rate: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AiServicesStatus {
    pub resources: BTreeMap<String, AiResourceStatus>,
    pub services: Vec<AiServiceStatus>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AiResourceStatus {
    pub total_available: u32,
    pub total_in_use: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AiServiceStatus {
    pub name: String,
    pub service_url: String,
    pub is_running: bool,
    pub resource_requirements: BTreeMap<String, u32>,
}
