//! Load generation and metrics for the dataset Router.
//!
//! - **[`LoadEngine`]**: runs `total_requests` transfers over at most
//!   `concurrency` worker tasks, one fresh client per transfer from a
//!   [`TransferFactory`], and reports its [`LoadPhase`] through a watch
//!   channel.
//!
//! - **[`summarize`]**: folds the collected results into a
//!   [`LoadTestSummary`] (counts, TTFB percentiles, throughput, request
//!   rate).
//!
//! - **[`MetricsLog`]**: append-only CSV of [`MetricEntry`] rows, plus a
//!   [`MetricsSummary`] over whatever the file holds.

pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod stats;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{LoadTestConfig, PatternSelector};
pub use engine::{
    LoadEngine, LoadPhase, LoadReport, Progress, RouterTransferFactory, TransferFactory,
};
pub use error::CoreError;
pub use record::{MetricEntry, MetricsLog, MetricsSummary};
pub use stats::{LoadTestSummary, summarize};
