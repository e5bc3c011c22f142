//! Uniform outcome of one transfer, whatever the pattern.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Error;
use crate::models::{RemoteTimestamps, RouterStatus};

/// Terminal state of a transfer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransferStatus {
    Completed,
    Error,
    Timeout,
    #[default]
    Pending,
}

impl From<RouterStatus> for TransferStatus {
    fn from(status: RouterStatus) -> Self {
        match status {
            RouterStatus::Completed => Self::Completed,
            RouterStatus::Error => Self::Error,
            RouterStatus::Pending | RouterStatus::Processing | RouterStatus::Unknown => {
                Self::Pending
            }
        }
    }
}

/// Data-transfer pattern exercised against the Router.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Pattern {
    /// Pattern A: the Router assembles the dataset and returns it inline.
    Buffered,
    /// Pattern B: chunked stream terminated by an in-band marker.
    Streaming,
    /// Pattern C: polled out-of-band download URL.
    Offload,
}

impl Pattern {
    /// Round-robin pick used by mixed runs.
    pub fn from_index(index: usize) -> Self {
        match index % 3 {
            0 => Self::Buffered,
            1 => Self::Streaming,
            _ => Self::Offload,
        }
    }

    /// Short letter used in reports.
    pub fn letter(self) -> char {
        match self {
            Self::Buffered => 'A',
            Self::Streaming => 'B',
            Self::Offload => 'C',
        }
    }
}

/// What to fetch and how long the whole exchange may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Hardware address of the connector that holds the dataset.
    pub device_address: String,
    pub dataset_name: String,
    pub deadline: Duration,
}

impl TransferRequest {
    pub fn new(
        device_address: impl Into<String>,
        dataset_name: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            device_address: device_address.into(),
            dataset_name: dataset_name.into(),
            deadline,
        }
    }
}

/// Outcome of one [`TransferRequest`].
///
/// `sent_at` is captured before the first network call and `completed_at`
/// when the pattern judges its work finished; the pair is the sole basis for
/// TTFB. `completed_at` is never earlier than `sent_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    /// Router-assigned identifier, empty if never assigned.
    pub request_id: String,
    pub status: TransferStatus,
    #[serde(default)]
    pub pattern: Option<Pattern>,
    #[serde(default)]
    pub payload_size: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timestamps: Option<RemoteTimestamps>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TransferResult {
    /// Start the clock for a new exchange.
    pub fn started(pattern: Option<Pattern>) -> Self {
        Self {
            pattern,
            sent_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// An `error` result with no timing, for failures outside any exchange.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TransferStatus::Error,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_timestamps(mut self, timestamps: Option<RemoteTimestamps>) -> Self {
        self.timestamps = timestamps.and_then(RemoteTimestamps::non_empty);
        self
    }

    /// Stamp `completed_at` now, clamped so it never precedes `sent_at`.
    pub fn stop_clock(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(match self.sent_at {
            Some(sent) if sent > now => sent,
            _ => now,
        });
    }

    /// Terminal with the given status; stops the clock if still running.
    pub fn finish(mut self, status: TransferStatus) -> Self {
        self.status = status;
        if self.completed_at.is_none() {
            self.stop_clock();
        }
        self
    }

    /// `completed` with the payload size that was observed.
    pub fn complete(mut self, payload_size: Option<u64>) -> Self {
        self.payload_size = payload_size;
        self.finish(TransferStatus::Completed)
    }

    /// Fold an error into a terminal result: `timeout` for deadlines,
    /// `error` with the error's description otherwise.
    pub fn fail(mut self, err: &Error) -> Self {
        let status = if err.is_timeout() {
            TransferStatus::Timeout
        } else {
            TransferStatus::Error
        };
        self.error = Some(err.to_string());
        self.finish(status)
    }

    /// `timeout` with a custom message (polling windows exhausted).
    pub fn time_out(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self.finish(TransferStatus::Timeout)
    }

    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Completed
    }

    /// Client-observed latency in seconds (`completed_at - sent_at`).
    pub fn ttfb(&self) -> Option<f64> {
        let elapsed = self.completed_at? - self.sent_at?;
        elapsed.to_std().ok().map(|d| d.as_secs_f64())
    }

    /// Bytes per second over the TTFB window, when both are known and TTFB > 0.
    pub fn throughput(&self) -> Option<f64> {
        let ttfb = self.ttfb()?;
        let size = self.payload_size?;
        (ttfb > 0.0).then(|| bytes_f64(size) / ttfb)
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn bytes_f64(n: u64) -> f64 {
    n as f64
}
