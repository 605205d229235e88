//! Inter-arrival latency of the push feed

use serde::Serialize;
use std::time::Instant;

use crate::stats::{mean, percentile_sorted, sorted};

/// Distribution of gaps between consecutive raw messages, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub mean: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub p90: f64,
    pub p99: f64,
}

/// Consecutive differences of the arrival log in milliseconds
pub fn inter_arrival_gaps_ms(arrivals: &[Instant]) -> Vec<f64> {
    arrivals
        .windows(2)
        .map(|w| w[1].saturating_duration_since(w[0]).as_secs_f64() * 1000.0)
        .collect()
}

/// Latency statistics; `None` with fewer than two arrivals
pub fn latency_stats(arrivals: &[Instant]) -> Option<LatencyStats> {
    if arrivals.len() < 2 {
        return None;
    }

    let gaps = sorted(&inter_arrival_gaps_ms(arrivals));

    Some(LatencyStats {
        samples: gaps.len(),
        mean: mean(&gaps)?,
        median: percentile_sorted(&gaps, 50.0)?,
        q1: percentile_sorted(&gaps, 25.0)?,
        q3: percentile_sorted(&gaps, 75.0)?,
        p90: percentile_sorted(&gaps, 90.0)?,
        p99: percentile_sorted(&gaps, 99.0)?,
    })
}
