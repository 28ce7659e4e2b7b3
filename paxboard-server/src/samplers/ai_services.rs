use async_trait::async_trait;
use paxboard_shared::metrics::{AiResourceStatus, AiServiceStatus, AiServicesStatus};
use paxboard_shared::{Channel, Sample};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::Sampler;
use crate::error::SampleError;

/// Status of the services managed by a large-model-proxy instance.
pub struct AiServicesSampler {
    client: Client,
    url: String,
}

impl AiServicesSampler {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn status_url(&self) -> String {
        format!("{}/status", self.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Sampler for AiServicesSampler {
    fn channel(&self) -> Channel {
        Channel::AiServices
    }

    async fn sample(&mut self) -> Result<Sample, SampleError> {
        let request_failed = |source| SampleError::Request {
            channel: Channel::AiServices,
            source,
        };

        let status = self
            .client
            .get(self.status_url())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(request_failed)?
            .json::<ProxyStatus>()
            .await
            .map_err(request_failed)?;

        Ok(Sample::AiServices(status.into()))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ProxyStatus {
    services: Vec<ProxyServiceStatus>,
    resources: BTreeMap<String, ProxyResourceStatus>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProxyServiceStatus {
    name: String,
    is_running: bool,
    service_url: String,
    #[serde(default)]
    resource_requirements: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProxyResourceStatus {
    total_available: u32,
    total_in_use: u32,
}

impl From<ProxyStatus> for AiServicesStatus {
    fn from(status: ProxyStatus) -> Self {
        AiServicesStatus {
            resources: status
                .resources
                .into_iter()
                .map(|(name, r)| {
                    (
                        name,
                        AiResourceStatus {
                            total_available: r.total_available,
                            total_in_use: r.total_in_use,
                        },
                    )
                })
                .collect(),
            services: status
                .services
                .into_iter()
                .map(|s| AiServiceStatus {
                    name: s.name,
                    service_url: s.service_url,
                    is_running: s.is_running,
                    resource_requirements: s.resource_requirements,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_url_joins_path() {
        assert_eq!(
            AiServicesSampler::new("http://redline:7070/").status_url(),
            "http://redline:7070/status"
        );
        assert_eq!(
            AiServicesSampler::new("http://redline:7070").status_url(),
            "http://redline:7070/status"
        );
    }

    #[test]
    fn test_proxy_status_drops_internal_fields() {
        let body = r#"{
            "services": [{
                "name": "llama",
                "listen_port": "8081",
                "is_running": true,
                "active_connections": 2,
                "last_used": null,
                "service_url": "http://redline:8081",
                "resource_requirements": {"VRAM-GPU-1": 18000}
            }],
            "resources": {
                "VRAM-GPU-1": {"total_available": 24000, "total_in_use": 18000}
            }
        }"#;
        let status: AiServicesStatus = serde_json::from_str::<ProxyStatus>(body).unwrap().into();

        assert_eq!(status.services.len(), 1);
        assert_eq!(status.services[0].name, "llama");
        assert!(status.services[0].is_running);
        assert_eq!(status.services[0].resource_requirements["VRAM-GPU-1"], 18000);
        assert_eq!(status.resources["VRAM-GPU-1"].total_in_use, 18000);

        let wire = serde_json::to_value(&status).unwrap();
        assert!(wire["services"][0].get("listen_port").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_request_error() {
        // port 9 (discard) is not listening on loopback
        let mut sampler = AiServicesSampler::new("http://127.0.0.1:9");
        let err = sampler.sample().await.unwrap_err();
        assert_eq!(err.channel(), Channel::AiServices);
        assert!(matches!(err, SampleError::Request { .. }));
    }
}
