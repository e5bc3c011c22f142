// ── Run configuration ──
//
// What a load test does, independent of where the values came from. The CLI
// merges file, environment and flags into one of these and hands it in; core
// never reads config files.

use std::sync::LazyLock;
use std::time::Duration;

use routerbench_api::{Pattern, TransferRequest};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

use crate::error::CoreError;

/// Parsed once from a literal that is always a valid absolute URL.
#[allow(clippy::expect_used)]
static DEFAULT_BASE_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://localhost:8000").expect("default Router URL is valid"));

/// Which pattern(s) a run exercises.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PatternSelector {
    #[default]
    A,
    B,
    C,
    /// Round-robin over A, B, C by request index.
    #[serde(alias = "all")]
    #[strum(to_string = "mixed", serialize = "all")]
    Mixed,
}

impl PatternSelector {
    /// Pattern for the request at `index` (0-based submission order).
    pub fn pattern_for(self, index: usize) -> Pattern {
        match self {
            Self::A => Pattern::Buffered,
            Self::B => Pattern::Streaming,
            Self::C => Pattern::Offload,
            Self::Mixed => Pattern::from_index(index),
        }
    }
}

/// Parameters of one load test. Immutable once the engine has it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTestConfig {
    /// Router base URL.
    pub base_url: Url,
    /// Connector hardware address the datasets are requested from.
    pub device_address: String,
    pub total_requests: usize,
    /// Upper bound on transfers in flight at once.
    pub concurrency: usize,
    pub pattern: PatternSelector,
    pub dataset_name: String,
    /// Per-request deadline.
    pub timeout: Duration,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.clone(),
            device_address: "cc-28-aa-cd-5c-74".into(),
            total_requests: 100,
            concurrency: 10,
            pattern: PatternSelector::A,
            dataset_name: "dataset_1kb.json".into(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl LoadTestConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.total_requests == 0 {
            return Err(CoreError::invalid("total requests must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(CoreError::invalid("concurrency must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(CoreError::invalid("per-request timeout must be positive"));
        }
        if self.device_address.trim().is_empty() {
            return Err(CoreError::invalid("device address is empty"));
        }
        if self.dataset_name.trim().is_empty() {
            return Err(CoreError::invalid("dataset name is empty"));
        }
        Ok(())
    }

    /// Number of workers actually started.
    pub fn worker_count(&self) -> usize {
        self.concurrency.min(self.total_requests)
    }

    /// The request every operation of this run issues.
    pub fn transfer_request(&self) -> TransferRequest {
        TransferRequest::new(&self.device_address, &self.dataset_name, self.timeout)
    }
}
