//! On-disk configuration for routerbench.
//!
//! A YAML (or TOML) file layered over built-in defaults, with
//! `ROUTERBENCH_*` environment overrides on top, translated into the
//! runtime types of `routerbench-api` and `routerbench-core`. The CLI adds
//! flag overrides on top of this.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use url::Url;

use routerbench_api::{TlsMode, TransferOptions, TransportConfig};
use routerbench_core::{LoadTestConfig, PatternSelector};

/// File name looked up in the working directory before the platform path.
pub const LOCAL_CONFIG_FILE: &str = "routerbench.yaml";

const ENV_PREFIX: &str = "ROUTERBENCH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to serialize config as TOML: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Config structs ──────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub router: RouterSection,
    pub polling: PollingSection,
    pub streaming: StreamingSection,
    pub logging: LoggingSection,
    pub metrics: MetricsSection,
    pub load_test: LoadTestSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterSection {
    /// Router base URL.
    pub base_url: String,
    /// Request timeout in seconds; also the per-request deadline of load tests.
    pub timeout: u64,
    /// Accept invalid TLS certificates.
    pub insecure: bool,
    /// PEM file with an extra CA certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout: 60,
            insecure: false,
            ca_cert: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingSection {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_attempts: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingSection {
    /// Pause between initiating a stream and opening it.
    pub grace_ms: u64,
    /// Ceiling on a stream that never shows its completion marker.
    pub deadline_secs: u64,
    /// Extra time allowed for the metadata after the marker.
    pub trailer_ms: u64,
}

impl Default for StreamingSection {
    fn default() -> Self {
        Self {
            grace_ms: 100,
            deadline_secs: 120,
            trailer_ms: 2000,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing` filter directive used when neither `RUST_LOG` nor `-v` is given.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsSection {
    /// CSV file single requests are appended to.
    pub output_file: PathBuf,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from("metrics.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadTestSection {
    pub mac_address: String,
    pub dataset_name: String,
    pub requests: usize,
    pub concurrency: usize,
    pub pattern: PatternSelector,
}

impl Default for LoadTestSection {
    fn default() -> Self {
        Self {
            mac_address: "cc-28-aa-cd-5c-74".into(),
            dataset_name: "dataset_1kb.json".into(),
            requests: 100,
            concurrency: 10,
            pattern: PatternSelector::A,
        }
    }
}

// ── Translation to runtime types ────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if self.router.timeout == 0 {
            return Err(invalid("router.timeout", "must be at least 1 second"));
        }
        if self.polling.interval_ms == 0 {
            return Err(invalid("polling.interval_ms", "must be positive"));
        }
        if self.polling.max_attempts == 0 {
            return Err(invalid("polling.max_attempts", "must be at least 1"));
        }
        if self.streaming.deadline_secs == 0 {
            return Err(invalid("streaming.deadline_secs", "must be positive"));
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.router.base_url)
            .map_err(|e| invalid("router.base_url", format!("{e}: {}", self.router.base_url)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.router.timeout)
    }

    pub fn tls_mode(&self) -> TlsMode {
        if self.router.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca) = self.router.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else {
            TlsMode::System
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls_mode(),
            ..TransportConfig::with_timeout(self.timeout())
        }
    }

    pub fn transfer_options(&self) -> TransferOptions {
        TransferOptions {
            poll_interval: Duration::from_millis(self.polling.interval_ms),
            max_poll_attempts: self.polling.max_attempts,
            stream_grace: Duration::from_millis(self.streaming.grace_ms),
            stream_deadline: Duration::from_secs(self.streaming.deadline_secs),
            trailer_allowance: Duration::from_millis(self.streaming.trailer_ms),
        }
    }

    /// The `load_test` section as a run configuration.
    pub fn load_test(&self) -> Result<LoadTestConfig, ConfigError> {
        Ok(LoadTestConfig {
            base_url: self.base_url()?,
            device_address: self.load_test.mac_address.clone(),
            total_requests: self.load_test.requests,
            concurrency: self.load_test.concurrency,
            pattern: self.load_test.pattern,
            dataset_name: self.load_test.dataset_name.clone(),
            timeout: self.timeout(),
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Platform config file (`~/.config/routerbench/config.yaml` on Linux).
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "routerbench", "routerbench").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("routerbench");
            p.push("config.yaml");
            p
        },
        |dirs| dirs.config_dir().join("config.yaml"),
    )
}

/// `explicit`, else `./routerbench.yaml` if present, else [`config_path`].
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return local;
    }
    config_path()
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

// ── Config loading ──────────────────────────────────────────────────

/// Load defaults, then `path` (missing files are skipped), then environment.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
    figment = if is_toml(path) {
        figment.merge(Toml::file(path))
    } else {
        figment.merge(Yaml::file(path))
    };
    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

/// Load the config found by [`resolve_path`].
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    load_from(&resolve_path(explicit))
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize `cfg` as YAML, or TOML when the file name ends in `.toml`.
pub fn render(cfg: &Config, path: &Path) -> Result<String, ConfigError> {
    if is_toml(path) {
        Ok(toml::to_string_pretty(cfg)?)
    } else {
        Ok(serde_yaml::to_string(cfg)?)
    }
}

/// Write `cfg` to `path`, creating parent directories.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render(cfg, path)?)?;
    Ok(())
}
