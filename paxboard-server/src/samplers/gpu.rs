use async_trait::async_trait;
use paxboard_shared::metrics::GpuStats;
use paxboard_shared::{Channel, Sample};
use std::io::ErrorKind;
use tracing::debug;

use super::Sampler;
use crate::error::SampleError;
use crate::util::subprocess::SubprocessBuilder;
use crate::util::units::usage_percent;

const QUERY: &str = "--query-gpu=name,temperature.gpu,utilization.gpu,memory.used,memory.total,power.draw,power.limit";
const FIELDS: usize = 7;

/// NVIDIA GPUs via `nvidia-smi`. Hosts without the tool or without a device
/// report an empty list.
pub struct GpuSampler {
    command: SubprocessBuilder,
}

impl GpuSampler {
    pub fn new() -> Self {
        Self::with_program("nvidia-smi")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            command: SubprocessBuilder::new(program)
                .args([QUERY, "--format=csv,noheader,nounits"]),
        }
    }
}

impl Default for GpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for GpuSampler {
    fn channel(&self) -> Channel {
        Channel::Gpus
    }

    async fn sample(&mut self) -> Result<Sample, SampleError> {
        let out = match self.command.output().await {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Sample::Gpus(Vec::new()));
            }
            Err(source) => {
                return Err(SampleError::Spawn {
                    channel: Channel::Gpus,
                    program: self.command.program().to_string(),
                    source,
                });
            }
        };

        if !out.status.success() {
            // "No devices were found" or a missing driver
            debug!(
                "{} exited with {}: {}",
                self.command.program(),
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
            return Ok(Sample::Gpus(Vec::new()));
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        parse_gpu_csv(&stdout).map(Sample::Gpus)
    }
}

/// Parses `nvidia-smi --format=csv,noheader,nounits` output, one GPU per line.
pub fn parse_gpu_csv(output: &str) -> Result<Vec<GpuStats>, SampleError> {
    output
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_gpu_line)
        .collect()
}

fn parse_gpu_line(line: &str) -> Result<GpuStats, SampleError> {
    let parts: Vec<_> = line.split(',').map(|x| x.trim()).collect();
    if parts.len() < FIELDS {
        return Err(SampleError::parse(
            Channel::Gpus,
            format!("expected {FIELDS} fields, got {}: {line:?}", parts.len()),
        ));
    }

    let memory_used = reading(parts[3])?;
    let memory_total = reading(parts[4])?;
    Ok(GpuStats {
        name: parts[0].to_string(),
        temperature: reading(parts[1])?,
        utilization: reading(parts[2])?,
        memory_used,
        memory_total,
        memory_usage: usage_percent(memory_used, memory_total),
        power_draw: reading(parts[5])?,
        power_limit: reading(parts[6])?,
    })
}

/// Readings a board does not support come back as `[N/A]` and count as 0.
fn reading(field: &str) -> Result<f64, SampleError> {
    if field.contains("N/A") || field.contains("Not Supported") {
        return Ok(0.0);
    }
    field
        .parse::<f64>()
        .map_err(|e| SampleError::parse(Channel::Gpus, format!("{field:?}: {e}")))
}
