//! Clap derive structures for the `routerbench` CLI.
//!
//! Only depends on clap and clap_complete so `build.rs` can include it to
//! render man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// routerbench -- drive a dataset Router and measure it
#[derive(Debug, Parser)]
#[command(
    name = "routerbench",
    version,
    about = "Request datasets from a Router and load-test its transfer patterns",
    long_about = "Request datasets from a dataset Router and load-test it.\n\n\
        Pattern A (buffered) returns the dataset inline, pattern B streams it\n\
        with an in-band completion marker, pattern C offloads it to storage\n\
        and hands back a download URL. Every request is timed and can be\n\
        appended to a CSV metrics log.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (default: ./routerbench.yaml, then the platform config dir)
    #[arg(long, env = "ROUTERBENCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Router base URL (overrides the config file)
    #[arg(long, short = 'u', env = "ROUTERBENCH_URL", global = true)]
    pub url: Option<String>,

    /// Request timeout in seconds; the per-request deadline of load tests
    #[arg(long, short = 't', env = "ROUTERBENCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ROUTERBENCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output_format: OutputFormat,

    /// Log format (overrides logging.format)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Shared Enums ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RequestMode {
    /// Initiate, then poll status until the data is ready
    Poll,
    /// Pattern A: buffered, one blocking call
    Sync,
    /// Pattern B: streamed with a completion marker
    Stream,
    /// Pattern C: offloaded to storage, downloaded by URL
    Offload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PatternArg {
    /// Buffered
    A,
    /// Streaming
    B,
    /// Offload
    C,
    /// Rotate A, B, C by request index
    #[value(alias = "all")]
    Mixed,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Request one dataset and record its metrics
    #[command(alias = "req")]
    Request(RequestArgs),

    /// Show the Router's status for a request
    Status {
        /// Request identifier returned by the Router
        request_id: String,
    },

    /// List connectors attached to the Router
    #[command(alias = "list-hosts")]
    Hosts,

    /// Check that the Router answers
    Health,

    /// Summarize the metrics log
    Metrics(MetricsArgs),

    /// Run a load test against the Router
    #[command(alias = "load")]
    LoadTest(LoadTestArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Request ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Hardware address of the connector holding the dataset
    pub mac: String,

    /// Dataset name
    pub dataset: String,

    /// Transfer pattern
    #[arg(long, short = 'm', default_value = "poll")]
    pub mode: RequestMode,

    /// Return as soon as the Router accepted the request (poll mode only)
    #[arg(long)]
    pub no_wait: bool,

    /// Write the received payload to FILE (stream and offload modes)
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

// ── Metrics ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MetricsArgs {
    /// Metrics CSV to read (default: metrics.output_file)
    #[arg(long, short = 'f', value_name = "FILE")]
    pub file: Option<PathBuf>,
}

// ── Load test ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoadTestArgs {
    /// Total number of requests
    #[arg(long, short = 'r', value_parser = positive)]
    pub requests: Option<usize>,

    /// Maximum requests in flight
    #[arg(long, short = 'c', value_parser = positive)]
    pub concurrency: Option<usize>,

    /// Pattern to exercise
    #[arg(long, short = 'p', ignore_case = true)]
    pub pattern: Option<PatternArg>,

    /// Dataset name
    #[arg(long, short = 'd')]
    pub dataset: Option<String>,

    /// Connector hardware address
    #[arg(long)]
    pub mac: Option<String>,

    /// Append every result to this metrics CSV
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,
}

fn positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".into()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration
    Show,

    /// Print the configuration file path in use
    Path,

    /// Write a configuration file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
