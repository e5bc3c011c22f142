//! CLI error types with miette diagnostics.
//!
//! Maps API, core and config errors into user-facing errors with help text
//! and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use routerbench_config::ConfigError;
use routerbench_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const TRANSFER_FAILED: i32 = 9;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Router at {url}")]
    #[diagnostic(
        code(routerbench::connection_failed),
        help(
            "Check that the Router is running and reachable.\n\
             URL: {url}\n\
             Override it with --url or router.base_url in the config file."
        )
    )]
    ConnectionFailed { url: String },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(routerbench::tls_error),
        help("Use --insecure (-k) to accept self-signed certificates, or set router.ca_cert.")
    )]
    TlsError { message: String },

    // ── Router ───────────────────────────────────────────────────────
    #[error("Router returned HTTP {status}: {body}")]
    #[diagnostic(code(routerbench::router_error))]
    RouterError { status: u16, body: String },

    #[error("Request {request_id} {status}: {message}")]
    #[diagnostic(
        code(routerbench::transfer_failed),
        help("Inspect it with: routerbench status {request_id}")
    )]
    TransferFailed {
        request_id: String,
        status: String,
        message: String,
    },

    #[error("Request timed out: {message}")]
    #[diagnostic(
        code(routerbench::timeout),
        help("Increase the deadline with --timeout or polling.max_attempts.")
    )]
    Timeout { message: String },

    #[error("{0}")]
    #[diagnostic(code(routerbench::api))]
    Api(routerbench_api::Error),

    // ── Load test ────────────────────────────────────────────────────
    #[error("Load test interrupted after {completed}/{total} requests")]
    #[diagnostic(code(routerbench::interrupted))]
    Interrupted { completed: usize, total: usize },

    // ── Metrics ──────────────────────────────────────────────────────
    #[error("No metrics recorded at {path}")]
    #[diagnostic(
        code(routerbench::no_metrics),
        help("Record some with: routerbench request <MAC> <DATASET>")
    )]
    NoMetrics { path: String },

    #[error("Metrics log error: {message}")]
    #[diagnostic(code(routerbench::metrics))]
    Metrics { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(routerbench::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(routerbench::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(routerbench::config),
        help("Check the file shown by: routerbench config path")
    )]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(routerbench::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::TransferFailed { .. } => exit_code::TRANSFER_FAILED,
            Self::Interrupted { .. } => exit_code::INTERRUPTED,
            Self::Validation { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            Self::Api(err) if err.is_connect() => exit_code::CONNECTION,
            Self::Api(err) if err.is_timeout() => exit_code::TIMEOUT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Upstream error mapping ───────────────────────────────────────────

impl From<routerbench_api::Error> for CliError {
    fn from(err: routerbench_api::Error) -> Self {
        match err {
            routerbench_api::Error::Tls(message) => Self::TlsError { message },
            routerbench_api::Error::Protocol { status, body } => Self::RouterError { status, body },
            routerbench_api::Error::Timeout { timeout_secs } => Self::Timeout {
                message: format!("no answer within {timeout_secs}s"),
            },
            other => Self::Api(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfig { message } => Self::Validation {
                field: "load test".into(),
                reason: message,
            },
            CoreError::Interrupted { completed, total } => Self::Interrupted { completed, total },
            CoreError::Api(err) => err.into(),
            CoreError::Csv(err) => Self::Metrics {
                message: err.to_string(),
            },
            CoreError::Io(err) => Self::Io(err),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(err) => Self::Io(err),
            other => Self::Config(other),
        }
    }
}
