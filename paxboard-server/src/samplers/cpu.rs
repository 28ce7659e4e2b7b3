use async_trait::async_trait;
use paxboard_shared::metrics::{CoreStats, CpuStats};
use paxboard_shared::{Channel, Sample};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sysinfo::{Components, MINIMUM_CPU_UPDATE_INTERVAL, System};

use super::{Sampler, blocking, lock_idle};
use crate::error::SampleError;
use crate::util::units::round_to;

/// Sensor labels carrying the package temperature (Intel, AMD).
const PACKAGE_SENSORS: [&str; 2] = ["Package id 0", "Tctl"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreReading {
    pub mhz: u64,
    pub usage: f32,
}

// usage is a delta between refreshes, so the System lives across ticks
struct CpuState {
    system: System,
    refreshed_at: Instant,
}

impl CpuState {
    /// Refreshes usage counters, first waiting out whatever is left of the
    /// minimum gap since the previous refresh.
    fn refresh(&mut self) {
        std::thread::sleep(settle_delay(self.refreshed_at, Instant::now()));
        self.system.refresh_cpu_all();
        self.refreshed_at = Instant::now();
    }
}

pub struct CpuSampler {
    state: Arc<Mutex<CpuState>>,
}

impl CpuSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            state: Arc::new(Mutex::new(CpuState {
                system,
                refreshed_at: Instant::now(),
            })),
        }
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for CpuSampler {
    fn channel(&self) -> Channel {
        Channel::Cpu
    }

    async fn sample(&mut self) -> Result<Sample, SampleError> {
        let state = self.state.clone();
        let stats = blocking(Channel::Cpu, move || -> Result<_, SampleError> {
            let mut cpu = lock_idle(Channel::Cpu, &state)?;
            cpu.refresh();
            let sys = &cpu.system;

            let cores: Vec<CoreReading> = sys
                .cpus()
                .iter()
                .map(|c| CoreReading {
                    mhz: c.frequency(),
                    usage: c.cpu_usage(),
                })
                .collect();

            let components = Components::new_with_refreshed_list();
            let temperature = package_temperature(
                components
                    .list()
                    .iter()
                    .map(|c| (c.label(), c.temperature())),
            );

            Ok(cpu_stats(sys.global_cpu_usage(), &cores, temperature))
        })
        .await??;

        Ok(Sample::Cpu(stats))
    }
}

/// How long to wait before a refresh so usage spans at least
/// `MINIMUM_CPU_UPDATE_INTERVAL`.
fn settle_delay(refreshed_at: Instant, now: Instant) -> Duration {
    MINIMUM_CPU_UPDATE_INTERVAL.saturating_sub(now.saturating_duration_since(refreshed_at))
}

pub fn cpu_stats(usage: f32, cores: &[CoreReading], temperature: Option<f64>) -> CpuStats {
    CpuStats {
        usage: round_to(usage as f64, 1),
        temperature,
        cores: cores.len(),
        core_stats: cores
            .iter()
            .enumerate()
            .map(|(core, reading)| CoreStats {
                core,
                mhz: reading.mhz,
                usage: round_to(reading.usage as f64, 1),
            })
            .collect(),
    }
}

/// First package sensor with a reading, in celsius with one decimal.
pub fn package_temperature<'a>(
    sensors: impl IntoIterator<Item = (&'a str, Option<f32>)>,
) -> Option<f64> {
    sensors
        .into_iter()
        .filter(|(label, _)| PACKAGE_SENSORS.iter().any(|p| label.contains(p)))
        .find_map(|(_, temp)| temp.filter(|t| t.is_finite()))
        .map(|t| round_to(t as f64, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_stats_rounds_and_numbers_cores() {
        let cores = [
            CoreReading {
                mhz: 3600,
                usage: 12.34,
            },
            CoreReading {
                mhz: 4100,
                usage: 87.66,
            },
        ];
        let stats = cpu_stats(49.99, &cores, Some(55.0));
        assert_eq!(stats.usage, 50.0);
        assert_eq!(stats.cores, 2);
        assert_eq!(stats.temperature, Some(55.0));
        assert_eq!(
            stats.core_stats,
            vec![
                CoreStats {
                    core: 0,
                    mhz: 3600,
                    usage: 12.3
                },
                CoreStats {
                    core: 1,
                    mhz: 4100,
                    usage: 87.7
                },
            ]
        );
    }

    #[test]
    fn test_package_temperature_picks_known_sensor() {
        let sensors = [
            ("acpitz temp1", Some(27.8)),
            ("coretemp Package id 0", Some(61.04)),
            ("coretemp Core 0", Some(58.0)),
        ];
        assert_eq!(package_temperature(sensors), Some(61.0));

        let amd = [("k10temp Tctl", Some(48.25))];
        assert_eq!(package_temperature(amd), Some(48.3));
    }

    #[test]
    fn test_package_temperature_absent() {
        assert_eq!(package_temperature([("acpitz temp1", Some(30.0))]), None);
        assert_eq!(package_temperature([("k10temp Tctl", None)]), None);
        assert_eq!(package_temperature(Vec::<(&str, Option<f32>)>::new()), None);
    }

    #[tokio::test]
    async fn test_sample_reads_this_host() {
        let mut sampler = CpuSampler::new();
        match sampler.sample().await.unwrap() {
            Sample::Cpu(stats) => {
                assert_eq!(stats.cores, stats.core_stats.len());
                assert!(stats.usage >= 0.0);
            }
            other => panic!("unexpected sample {other:?}"),
        }
    }

    #[test]
    fn test_settle_delay() {
        let t0 = Instant::now();
        assert_eq!(settle_delay(t0, t0), MINIMUM_CPU_UPDATE_INTERVAL);
        assert_eq!(
            settle_delay(t0, t0 + MINIMUM_CPU_UPDATE_INTERVAL / 4),
            MINIMUM_CPU_UPDATE_INTERVAL - MINIMUM_CPU_UPDATE_INTERVAL / 4
        );
        assert_eq!(settle_delay(t0, t0 + MINIMUM_CPU_UPDATE_INTERVAL), Duration::ZERO);
        assert_eq!(settle_delay(t0, t0 + Duration::from_secs(60)), Duration::ZERO);
        // clock behind the baseline
        assert_eq!(settle_delay(t0 + Duration::from_secs(1), t0), MINIMUM_CPU_UPDATE_INTERVAL);
    }

    #[tokio::test]
    async fn test_first_sample_spans_minimum_update_interval() {
        let started = Instant::now();
        let mut sampler = CpuSampler::new();
        sampler.sample().await.unwrap();
        assert!(started.elapsed() >= MINIMUM_CPU_UPDATE_INTERVAL);

        let state = sampler.state.lock().unwrap();
        assert!(state.refreshed_at >= started + MINIMUM_CPU_UPDATE_INTERVAL);
    }

    #[tokio::test]
    async fn test_sample_fails_while_previous_read_in_flight() {
        let mut sampler = CpuSampler::new();
        let state = sampler.state.clone();
        let stuck = state.lock().unwrap();

        let err = sampler.sample().await.unwrap_err();
        assert!(matches!(err, SampleError::Task { channel: Channel::Cpu, .. }));

        drop(stuck);
        assert!(sampler.sample().await.is_ok());
    }
}
