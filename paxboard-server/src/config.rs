use anyhow::{Context, Result, bail};
use paxboard_shared::Channel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_PATH_ENV: &str = "PAXBOARD_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub bind_address: String,
    pub port: u16,
    pub sample_timeout_ms: u64,
    /// Frames buffered per session before it is considered too slow and dropped.
    pub session_queue_capacity: usize,
    pub keepalive_interval_secs: u64,
    pub idle_timeout_secs: u64,
    /// Mount points reported on the `disks` channel, in order.
    pub disk_paths: Vec<String>,
    /// Base URL of a large-model-proxy; enables the `aiServices` channel.
    pub large_model_proxy_url: Option<String>,
    /// Per-channel overrides. Channels not listed use their default interval.
    pub channels: BTreeMap<Channel, ChannelConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    #[serde(default)]
    pub interval_ms: Option<u64>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 7072,
            sample_timeout_ms: 5_000,
            session_queue_capacity: 64,
            keepalive_interval_secs: 30,
            idle_timeout_secs: 90,
            disk_paths: vec!["/".to_string(), "/home".to_string()],
            large_model_proxy_url: None,
            channels: BTreeMap::new(),
        }
    }
}

pub fn default_interval(channel: Channel) -> Duration {
    match channel {
        Channel::Cpu | Channel::Memory | Channel::Gpus | Channel::Network => {
            Duration::from_secs(2)
        }
        Channel::Disks => Duration::from_secs(10),
        Channel::AiServices => Duration::from_secs(5),
    }
}

impl AppConfig {
    /// Loads from `$PAXBOARD_CONFIG`, or `./config.json`. A missing file means defaults.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            info!("Loading config from: {:?}", path);
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str::<AppConfig>(&contents).context("Failed to parse config file")?
        } else {
            warn!("Config file {:?} not found, using defaults", path);
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_timeout_ms == 0 {
            bail!("sample_timeout_ms must be greater than zero");
        }
        if self.session_queue_capacity == 0 {
            bail!("session_queue_capacity must be greater than zero");
        }
        if self.keepalive_interval_secs == 0 || self.idle_timeout_secs == 0 {
            bail!("keepalive_interval_secs and idle_timeout_secs must be greater than zero");
        }
        // idleness is only checked when a keepalive ping is due
        if self.idle_timeout_secs < self.keepalive_interval_secs {
            bail!(
                "idle_timeout_secs ({}) must not be shorter than keepalive_interval_secs ({})",
                self.idle_timeout_secs,
                self.keepalive_interval_secs
            );
        }
        for (channel, cfg) in &self.channels {
            if cfg.interval_ms == Some(0) {
                bail!("channels.{channel}.interval_ms must be greater than zero");
            }
        }
        Ok(())
    }

    /// Poll interval for `channel`, or `None` when it is disabled.
    pub fn interval_for(&self, channel: Channel) -> Option<Duration> {
        match self.channels.get(&channel) {
            Some(cfg) if !cfg.enabled => None,
            Some(ChannelConfig {
                interval_ms: Some(ms),
                ..
            }) => Some(Duration::from_millis(*ms)),
            _ => Some(default_interval(channel)),
        }
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 7072);
        assert_eq!(config.disk_paths, vec!["/", "/home"]);
        assert!(config.large_model_proxy_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_intervals() {
        let config = AppConfig::default();
        assert_eq!(config.interval_for(Channel::Cpu), Some(Duration::from_secs(2)));
        assert_eq!(config.interval_for(Channel::Disks), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let json = r#"{
            "port": 9000,
            "channels": {
                "disks": {"interval_ms": 30000},
                "gpus": {"enabled": false}
            }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.sample_timeout_ms, 5_000);
        assert_eq!(config.interval_for(Channel::Disks), Some(Duration::from_secs(30)));
        assert_eq!(config.interval_for(Channel::Gpus), None);
        assert_eq!(config.interval_for(Channel::Memory), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"large_model_proxy_url": "http://localhost:7070", "disk_paths": ["/"]}}"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(
            config.large_model_proxy_url.as_deref(),
            Some("http://localhost:7070")
        );
        assert_eq!(config.disk_paths, vec!["/"]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.port, 7072);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "port = 7072").unwrap();
        assert!(AppConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn test_idle_timeout_shorter_than_keepalive_rejected() {
        let json = r#"{"keepalive_interval_secs": 30, "idle_timeout_secs": 10}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{json}").unwrap();
        assert!(AppConfig::load_from(file.path()).is_err());

        let equal = r#"{"keepalive_interval_secs": 30, "idle_timeout_secs": 30}"#;
        let config: AppConfig = serde_json::from_str(equal).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let json = r#"{"channels": {"cpu": {"interval_ms": 0}}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }
}
