//! Metrics Collector
//!
//! Running request aggregates for a node or for the whole network.

use crate::domain::entities::Metrics;
use parking_lot::RwLock;
use std::time::Instant;

/// Incremental running mean: the mean of `n` samples given the mean of the
/// first `n - 1` and the new sample.
fn running_mean(mean: f64, n: u64, sample: f64) -> f64 {
    (mean * (n - 1) as f64 + sample) / n as f64
}

fn indicator(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Owns the mutable [`Metrics`] of one node (or the network).
///
/// `update` is the only mutation path. Readers get value copies.
#[derive(Default)]
pub struct MetricsCollector {
    state: RwLock<Metrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished request that started at `start`.
    ///
    /// `success == false` counts towards the error rate; `cache_hit` towards
    /// the cache hit rate.
    pub fn update(&self, start: Instant, success: bool, cache_hit: bool) {
        let elapsed = start.elapsed().as_secs_f64();
        let mut m = self.state.write();

        m.request_count += 1;
        let n = m.request_count;
        m.avg_response_time = running_mean(m.avg_response_time, n, elapsed);
        m.error_rate = running_mean(m.error_rate, n, indicator(!success));
        m.cache_hit_rate = running_mean(m.cache_hit_rate, n, indicator(cache_hit));
    }

    pub fn snapshot(&self) -> Metrics {
        *self.state.read()
    }
}
