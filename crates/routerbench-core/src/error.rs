// ── Core error types ──
//
// Errors that stop a whole run or a metrics-log operation. Individual
// transfer failures never show up here: they are terminal results and are
// counted, not raised.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid load test configuration: {message}")]
    InvalidConfig { message: String },

    // ── Run control ──────────────────────────────────────────────────
    #[error("Load test interrupted after {completed}/{total} requests")]
    Interrupted { completed: usize, total: usize },

    // ── Router ───────────────────────────────────────────────────────
    #[error("Router error: {0}")]
    Api(#[from] routerbench_api::Error),

    // ── Metrics log ──────────────────────────────────────────────────
    #[error("Metrics log error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
