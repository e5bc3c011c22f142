//! Metrics aggregation.
//!
//! Folds a run's [`TransferResult`]s into a [`LoadTestSummary`]. Percentiles
//! use the nearest-rank-below rule on the ascending values: index
//! `floor(q * n)`, clamped to the last element, no interpolation.

use std::time::Duration;

use routerbench_api::TransferResult;
use serde::Serialize;

/// Aggregate statistics for one load test. Built once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadTestSummary {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    /// Wall-clock duration of the run in seconds.
    pub duration_secs: f64,
    /// Observed TTFB values of successful transfers, ascending.
    pub ttfb_values: Vec<f64>,
    pub throughput_values: Vec<f64>,
    pub ttfb_min: f64,
    pub ttfb_max: f64,
    pub ttfb_mean: f64,
    pub ttfb_median: f64,
    pub ttfb_p90: f64,
    pub ttfb_p95: f64,
    pub ttfb_p99: f64,
    pub throughput_mean: f64,
    pub total_bytes: u64,
    pub requests_per_second: f64,
}

impl LoadTestSummary {
    /// Share of successful requests in percent.
    pub fn success_rate(&self) -> f64 {
        ratio(self.successful_requests, self.total_requests) * 100.0
    }

    pub fn failure_rate(&self) -> f64 {
        ratio(self.failed_requests, self.total_requests) * 100.0
    }
}

/// Summarize `results` collected over `wall_clock`.
///
/// Only `completed` results count as successful. TTFB comes from the two
/// client-side timestamps; throughput additionally needs a known size and a
/// positive TTFB.
pub fn summarize(results: &[TransferResult], wall_clock: Duration) -> LoadTestSummary {
    let mut summary = LoadTestSummary {
        total_requests: results.len(),
        duration_secs: wall_clock.as_secs_f64(),
        ..LoadTestSummary::default()
    };

    for result in results {
        if !result.is_success() {
            summary.failed_requests += 1;
            continue;
        }
        summary.successful_requests += 1;
        if let Some(ttfb) = result.ttfb() {
            summary.ttfb_values.push(ttfb);
        }
        if let Some(size) = result.payload_size {
            summary.total_bytes += size;
        }
        if let Some(throughput) = result.throughput() {
            summary.throughput_values.push(throughput);
        }
    }

    summary.ttfb_values.sort_by(f64::total_cmp);
    let ttfb = &summary.ttfb_values;
    summary.ttfb_min = ttfb.first().copied().unwrap_or(0.0);
    summary.ttfb_max = ttfb.last().copied().unwrap_or(0.0);
    summary.ttfb_mean = mean(ttfb);
    summary.ttfb_median = median(ttfb);
    summary.ttfb_p90 = percentile(ttfb, 0.90);
    summary.ttfb_p95 = percentile(ttfb, 0.95);
    summary.ttfb_p99 = percentile(ttfb, 0.99);
    summary.throughput_mean = mean(&summary.throughput_values);

    if summary.duration_secs > 0.0 {
        summary.requests_per_second = count_f64(summary.total_requests) / summary.duration_secs;
    }

    summary
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / count_f64(values.len())
}

/// Median of ascending `sorted`; the mean of the middle pair for even lengths.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

/// `sorted[floor(q * n)]`, clamped to the last element; 0 when empty.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let rank = (q.clamp(0.0, 1.0) * count_f64(sorted.len())).floor() as usize;
    sorted[rank.min(last)]
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn count_f64(n: usize) -> f64 {
    n as f64
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        count_f64(part) / count_f64(whole)
    }
}
