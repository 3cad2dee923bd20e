//! Latency statistics: interpolated percentiles and per-leg aggregates

use serde::{Deserialize, Serialize};

/// Interpolated percentile over ascending-sorted samples.
///
/// Index is `(p / 100) * (n - 1)` with linear interpolation between the
/// floor and ceil positions, so `percentile(&[10, 20, 30, 40], 50)` is 25
/// and the p50 of an odd-length array is its exact median element.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let idx = (p / 100.0) * (n - 1) as f64;
            let lo = idx.floor() as usize;
            let hi = idx.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                let frac = idx - lo as f64;
                sorted[lo] + (sorted[hi] - sorted[lo]) * frac
            }
        }
    }
}

/// Summary over one latency leg's populated samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyAggregate {
    pub count: usize,
    pub min_ms: f64,
    pub max_ms: f64,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl LatencyAggregate {
    /// Compute the aggregate, or `None` when the leg has no samples
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let sum: f64 = sorted.iter().sum();
        Some(Self {
            count: sorted.len(),
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            avg_ms: sum / sorted.len() as f64,
            p50_ms: percentile(&sorted, 50.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
        })
    }
}
