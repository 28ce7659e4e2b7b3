//! Throughput from monotonic interface byte counters.

use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct RateState {
    rx_bytes: u64,
    tx_bytes: u64,
    observed_at: Instant,
}

/// Last seen counters per interface. Entries for interfaces that disappear are
/// kept; the map is bounded by the number of interfaces the host ever had.
#[derive(Debug, Default)]
pub struct RateTracker {
    baselines: HashMap<String, RateState>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the counters and returns `(rx, tx)` in bytes per second.
    ///
    /// The first observation of an interface, a clock that did not advance,
    /// and a counter that went backwards (interface reset) all yield zero for
    /// the affected direction. The new counters always become the baseline.
    pub fn observe(
        &mut self,
        interface: &str,
        rx_bytes: u64,
        tx_bytes: u64,
        now: Instant,
    ) -> (f64, f64) {
        let current = RateState {
            rx_bytes,
            tx_bytes,
            observed_at: now,
        };

        let Some(previous) = self.baselines.insert(interface.to_string(), current) else {
            return (0.0, 0.0);
        };

        let elapsed = now
            .checked_duration_since(previous.observed_at)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        if elapsed <= 0.0 {
            return (0.0, 0.0);
        }

        let rx = rx_bytes.saturating_sub(previous.rx_bytes) as f64 / elapsed;
        let tx = tx_bytes.saturating_sub(previous.tx_bytes) as f64 / elapsed;
        (rx, tx)
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}
