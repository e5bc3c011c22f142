// ── Metrics log ──
//
// Append-only CSV of per-request measurements. The header is written only
// when the file is new or empty, so repeated runs accumulate rows in one
// file that spreadsheets and pandas read directly.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use routerbench_api::{RemoteTimestamps, TransferResult, TransferStatus};
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::error::CoreError;
use crate::stats;

/// One persisted measurement.
///
/// Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    /// When the entry was recorded (RFC 3339).
    pub timestamp: String,
    pub request_id: String,
    pub dataset_name: String,
    pub mac_address: String,
    pub status: TransferStatus,
    pub data_size_bytes: u64,
    #[serde(serialize_with = "fixed6")]
    pub ttfb_seconds: f64,
    #[serde(serialize_with = "fixed2")]
    pub throughput_bytes_per_sec: f64,
    /// Client send time, epoch seconds.
    #[serde(rename = "t0")]
    pub t0_sent: Option<f64>,
    #[serde(rename = "t1")]
    pub t1_received: Option<f64>,
    #[serde(rename = "t2")]
    pub t2_received: Option<f64>,
    #[serde(rename = "t3")]
    pub t3_start_send: Option<f64>,
    /// Client completion time, epoch seconds.
    #[serde(rename = "t4")]
    pub t4_received: Option<f64>,
}

impl MetricEntry {
    /// Derive an entry from a transfer outcome.
    pub fn from_result(result: &TransferResult, dataset_name: &str, mac_address: &str) -> Self {
        let remote = result.timestamps.unwrap_or_default();
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            request_id: result.request_id.clone(),
            dataset_name: dataset_name.to_string(),
            mac_address: mac_address.to_string(),
            status: result.status,
            data_size_bytes: result.payload_size.unwrap_or(0),
            ttfb_seconds: result.ttfb().unwrap_or(0.0),
            throughput_bytes_per_sec: result.throughput().unwrap_or(0.0),
            t0_sent: result.sent_at.map(epoch_seconds),
            t1_received: remote.t1_received,
            t2_received: remote.t2_received,
            t3_start_send: remote.t3_start_send,
            t4_received: result.completed_at.map(epoch_seconds),
        }
    }

    fn remote(&self) -> RemoteTimestamps {
        RemoteTimestamps {
            t1_received: self.t1_received,
            t2_received: self.t2_received,
            t3_start_send: self.t3_start_send,
        }
    }

    /// Time spent inside the Router (`t2 - t1`), when both are known.
    pub fn router_latency(&self) -> Option<f64> {
        self.remote().router_latency()
    }

    /// Time the connector took before sending (`t3 - t2`), when both are known.
    pub fn connector_latency(&self) -> Option<f64> {
        self.remote().connector_latency()
    }

    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Completed
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn fixed6<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{value:.6}"))
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn fixed2<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{value:.2}"))
}

// ── Log file ─────────────────────────────────────────────────────────

/// Handle on a metrics CSV file.
#[derive(Debug, Clone)]
pub struct MetricsLog {
    path: PathBuf,
}

impl MetricsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `entries`, writing the header first if the file is new.
    /// Returns the number of rows written; an empty slice touches nothing.
    pub fn append(&self, entries: &[MetricEntry]) -> Result<usize, CoreError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let needs_header = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        for entry in entries {
            writer.serialize(entry)?;
        }
        writer.flush()?;

        debug!(
            path = %self.path.display(),
            rows = entries.len(),
            header = needs_header,
            "metrics appended"
        );
        Ok(entries.len())
    }

    /// Read every row back.
    pub fn load(&self) -> Result<Vec<MetricEntry>, CoreError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let entries = reader.deserialize().collect::<Result<Vec<MetricEntry>, _>>()?;
        Ok(entries)
    }
}

// ── Summary over persisted rows ──────────────────────────────────────

/// Headline figures over a set of metric entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub count: usize,
    pub successful: usize,
    pub failed: usize,
    pub avg_ttfb_seconds: f64,
    pub min_ttfb_seconds: f64,
    pub max_ttfb_seconds: f64,
    pub avg_throughput_bytes_per_sec: f64,
}

impl MetricsSummary {
    /// TTFB figures cover successful rows; throughput only the positive ones.
    pub fn from_entries(entries: &[MetricEntry]) -> Self {
        let successful: Vec<&MetricEntry> = entries.iter().filter(|e| e.is_success()).collect();
        let ttfbs: Vec<f64> = successful.iter().map(|e| e.ttfb_seconds).collect();
        let throughputs: Vec<f64> = successful
            .iter()
            .map(|e| e.throughput_bytes_per_sec)
            .filter(|t| *t > 0.0)
            .collect();

        Self {
            count: entries.len(),
            successful: successful.len(),
            failed: entries.len() - successful.len(),
            avg_ttfb_seconds: stats::mean(&ttfbs),
            min_ttfb_seconds: ttfbs.iter().copied().reduce(f64::min).unwrap_or(0.0),
            max_ttfb_seconds: ttfbs.iter().copied().reduce(f64::max).unwrap_or(0.0),
            avg_throughput_bytes_per_sec: stats::mean(&throughputs),
        }
    }
}
