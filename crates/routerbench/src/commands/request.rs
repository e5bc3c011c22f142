//! `request`: fetch one dataset, record its metrics, report the outcome.

use std::path::Path;

use tracing::{info, warn};

use routerbench_api::{RouterClient, TransferRequest, TransferResult, TransferStatus};
use routerbench_core::{MetricEntry, MetricsLog};

use crate::cli::{GlobalOpts, RequestArgs, RequestMode};
use crate::config::Config;
use crate::error::CliError;
use crate::output;

// ── Detail view ─────────────────────────────────────────────────────

fn detail(result: &TransferResult) -> String {
    let mut rows = vec![
        ("Request ID", non_empty(&result.request_id)),
        (
            "Pattern",
            result
                .pattern
                .map_or_else(|| "polled".into(), |p| format!("{} ({p})", p.letter())),
        ),
        ("Status", result.status.to_string()),
        (
            "Size",
            result.payload_size.map_or_else(|| "-".into(), output::bytes),
        ),
        ("TTFB", output::seconds(result.ttfb())),
        ("Throughput", output::rate(result.throughput())),
    ];
    if let Some(ts) = result.timestamps {
        rows.push(("Router latency", output::seconds(ts.router_latency())));
        rows.push(("Connector latency", output::seconds(ts.connector_latency())));
    }
    if let Some(ref error) = result.error {
        rows.push(("Error", error.clone()));
    }
    output::key_value_table(rows)
}

fn non_empty(value: &str) -> String {
    if value.is_empty() { "-".into() } else { value.into() }
}

// ── Validation ──────────────────────────────────────────────────────

fn check_flags(args: &RequestArgs) -> Result<(), CliError> {
    if args.no_wait && args.mode != RequestMode::Poll {
        return Err(CliError::Validation {
            field: "--no-wait".into(),
            reason: "only applies to --mode poll".into(),
        });
    }
    if args.output.is_some() && !matches!(args.mode, RequestMode::Stream | RequestMode::Offload) {
        return Err(CliError::Validation {
            field: "--output".into(),
            reason: "payload files are only written in stream and offload modes".into(),
        });
    }
    Ok(())
}

// ── Transfer ────────────────────────────────────────────────────────

async fn fetch(
    client: &RouterClient,
    request: &TransferRequest,
    args: &RequestArgs,
) -> Result<TransferResult, CliError> {
    Ok(match (args.mode, args.output.as_deref()) {
        (RequestMode::Poll, _) => client.request_dataset(request, !args.no_wait).await,
        (RequestMode::Sync, _) => client.buffered_fetch(request).await,
        (RequestMode::Stream, None) => client.stream_fetch(request).await,
        (RequestMode::Offload, None) => client.offload_fetch(request).await,
        (RequestMode::Stream, Some(path)) => {
            let mut file = create(path).await?;
            client.stream_fetch_into(request, &mut file).await
        }
        (RequestMode::Offload, Some(path)) => {
            let mut file = create(path).await?;
            client.offload_fetch_into(request, &mut file).await
        }
    })
}

async fn create(path: &Path) -> Result<tokio::fs::File, CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(tokio::fs::File::create(path).await?)
}

fn record(cfg: &Config, result: &TransferResult, args: &RequestArgs) {
    let log = MetricsLog::new(&cfg.metrics.output_file);
    let entry = MetricEntry::from_result(result, &args.dataset, &args.mac);
    if let Err(e) = log.append(&[entry]) {
        warn!(path = %log.path().display(), error = %e, "could not record metrics");
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: &RequestArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    check_flags(args)?;

    let client = super::client(cfg)?;
    if !client.health_check().await {
        warn!(url = %client.base_url(), "Router health check failed, trying the request anyway");
    }

    let request = TransferRequest::new(&args.mac, &args.dataset, cfg.timeout());
    info!(mac = %args.mac, dataset = %args.dataset, mode = ?args.mode, "requesting dataset");
    let result = fetch(&client, &request, args).await?;

    if result.status != TransferStatus::Pending {
        record(cfg, &result, args);
    }

    let out = output::render_single(global.output_format, &result, detail)?;
    output::print_output(&out, global.quiet);

    match result.status {
        TransferStatus::Completed => {
            if let Some(ref path) = args.output {
                output::notice(&format!("Payload written to {}", path.display()), global.quiet);
            }
            Ok(())
        }
        TransferStatus::Pending => {
            output::notice(
                &format!(
                    "Request accepted. Check it with: routerbench status {}",
                    result.request_id
                ),
                global.quiet,
            );
            Ok(())
        }
        TransferStatus::Timeout => Err(CliError::Timeout {
            message: result.error.unwrap_or_else(|| "deadline exceeded".into()),
        }),
        TransferStatus::Error => Err(CliError::TransferFailed {
            request_id: non_empty(&result.request_id),
            status: result.status.to_string(),
            message: result.error.unwrap_or_else(|| "unknown error".into()),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn request_args(argv: &[&str]) -> RequestArgs {
        let mut full = vec!["routerbench", "request", "aa-bb", "data.json"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Request(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_wait_needs_poll_mode() {
        assert!(check_flags(&request_args(&["--no-wait"])).is_ok());
        assert!(check_flags(&request_args(&["--mode", "sync", "--no-wait"])).is_err());
    }

    #[test]
    fn output_file_needs_a_payload_mode() {
        assert!(check_flags(&request_args(&["-m", "stream", "--output", "x.bin"])).is_ok());
        assert!(check_flags(&request_args(&["-m", "offload", "--output", "x.bin"])).is_ok());
        let err = check_flags(&request_args(&["--output", "x.bin"])).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_code::USAGE);
    }

    #[test]
    fn detail_shows_error_and_placeholder_id() {
        let result = TransferResult::failed("HTTP 503: busy");
        let table = detail(&result);
        assert!(table.contains("HTTP 503: busy"));
        assert!(table.contains("polled"));
        assert!(table.contains("error"));
    }
}
