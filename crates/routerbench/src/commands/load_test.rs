//! `load-test`: drive the Router with many concurrent transfers.

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info_span;

use routerbench_core::{
    LoadEngine, LoadTestConfig, LoadTestSummary, MetricEntry, MetricsLog, PatternSelector,
    RouterTransferFactory,
};

use crate::cli::{GlobalOpts, LoadTestArgs, PatternArg};
use crate::config::Config;
use crate::error::CliError;
use crate::output;

// ── Run configuration ───────────────────────────────────────────────

/// `load_test` section of the config file with the flags laid over it.
fn run_config(args: &LoadTestArgs, cfg: &Config) -> Result<LoadTestConfig, CliError> {
    let mut run = cfg.load_test()?;
    if let Some(requests) = args.requests {
        run.total_requests = requests;
    }
    if let Some(concurrency) = args.concurrency {
        run.concurrency = concurrency;
    }
    if let Some(pattern) = args.pattern {
        run.pattern = match pattern {
            PatternArg::A => PatternSelector::A,
            PatternArg::B => PatternSelector::B,
            PatternArg::C => PatternSelector::C,
            PatternArg::Mixed => PatternSelector::Mixed,
        };
    }
    if let Some(ref dataset) = args.dataset {
        run.dataset_name.clone_from(dataset);
    }
    if let Some(ref mac) = args.mac {
        run.device_address.clone_from(mac);
    }
    Ok(run)
}

fn pattern_label(selector: PatternSelector) -> String {
    match selector {
        PatternSelector::Mixed => "mixed (A, B, C)".into(),
        single => {
            let pattern = single.pattern_for(0);
            format!("{} ({pattern})", pattern.letter())
        }
    }
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RunReport<'a> {
    base_url: &'a str,
    pattern: PatternSelector,
    dataset_name: &'a str,
    mac_address: &'a str,
    concurrency: usize,
    timeout_secs: u64,
    summary: &'a LoadTestSummary,
}

fn section(title: &str, table: &str) -> String {
    format!("{title}\n{table}")
}

fn detail(report: &RunReport<'_>) -> String {
    let s = report.summary;
    let mut sections = vec![
        section(
            "Configuration",
            &output::key_value_table([
                ("Router", report.base_url.to_owned()),
                ("Pattern", pattern_label(report.pattern)),
                ("Dataset", report.dataset_name.to_owned()),
                ("Connector", report.mac_address.to_owned()),
                ("Requests", s.total_requests.to_string()),
                ("Concurrency", report.concurrency.to_string()),
                ("Timeout", format!("{}s", report.timeout_secs)),
            ]),
        ),
        section(
            "Results",
            &output::key_value_table([
                (
                    "Successful",
                    format!("{} ({:.1}%)", s.successful_requests, s.success_rate()),
                ),
                (
                    "Failed",
                    format!("{} ({:.1}%)", s.failed_requests, s.failure_rate()),
                ),
                (
                    "Duration",
                    output::elapsed(Duration::from_secs_f64(s.duration_secs.max(0.0))),
                ),
                ("Requests/sec", format!("{:.2}", s.requests_per_second)),
                ("Total data", output::bytes(s.total_bytes)),
            ]),
        ),
    ];

    if s.successful_requests > 0 {
        sections.push(section(
            "Time to first byte",
            &output::key_value_table([
                ("Min", output::seconds(Some(s.ttfb_min))),
                ("Max", output::seconds(Some(s.ttfb_max))),
                ("Mean", output::seconds(Some(s.ttfb_mean))),
                ("Median", output::seconds(Some(s.ttfb_median))),
                ("P90", output::seconds(Some(s.ttfb_p90))),
                ("P95", output::seconds(Some(s.ttfb_p95))),
                ("P99", output::seconds(Some(s.ttfb_p99))),
                ("Mean throughput", output::rate(Some(s.throughput_mean))),
            ]),
        ));
    }
    sections.join("\n\n")
}

// ── Progress ────────────────────────────────────────────────────────

fn progress_bar(total: usize, global: &GlobalOpts) -> Option<ProgressBar> {
    if global.quiet || !io::stderr().is_terminal() {
        return None;
    }
    let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} requests | {msg}",
    )
    .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("##-"));
    bar.set_style(style);
    bar.set_message("0 failed");
    Some(bar)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: &LoadTestArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let run = run_config(args, cfg)?;

    let probe = super::client(cfg)?;
    if !probe.health_check().await {
        return Err(CliError::ConnectionFailed {
            url: probe.base_url().to_string(),
        });
    }

    let factory =
        RouterTransferFactory::new(run.base_url.clone(), cfg.transport(), cfg.transfer_options());
    let span = info_span!("load_test", pattern = %run.pattern, dataset = %run.dataset_name);
    let cancel = CancellationToken::new();
    let total = run.total_requests;

    let mut engine = LoadEngine::new(run, factory)?
        .with_span(span)
        .with_cancellation(cancel.clone());

    let bar = progress_bar(total, global);
    if let Some(ref bar) = bar {
        let bar = bar.clone();
        let failed = Arc::new(AtomicUsize::new(0));
        engine = engine.on_progress(move |progress| {
            if !progress.last.is_success() {
                let count = failed.fetch_add(1, Ordering::Relaxed) + 1;
                bar.set_message(format!("{count} failed"));
            }
            bar.set_position(u64::try_from(progress.completed).unwrap_or(u64::MAX));
        });
    }

    output::notice(
        &format!(
            "Running {total} requests, pattern {}, concurrency {}",
            pattern_label(engine.config().pattern),
            engine.config().concurrency
        ),
        global.quiet,
    );

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let outcome = engine.run().await;
    interrupt.abort();
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let report = outcome?;

    if let Some(ref path) = args.csv {
        let config = engine.config();
        let entries: Vec<MetricEntry> = report
            .results
            .iter()
            .map(|r| MetricEntry::from_result(r, &config.dataset_name, &config.device_address))
            .collect();
        let written = MetricsLog::new(path).append(&entries)?;
        output::notice(
            &format!("{written} results appended to {}", path.display()),
            global.quiet,
        );
    }

    let config = engine.config();
    let base_url = config.base_url.to_string();
    let view = RunReport {
        base_url: &base_url,
        pattern: config.pattern,
        dataset_name: &config.dataset_name,
        mac_address: &config.device_address,
        concurrency: config.concurrency,
        timeout_secs: config.timeout.as_secs(),
        summary: &report.summary,
    };
    let out = output::render_single(global.output_format, &view, detail)?;
    output::print_output(&out, global.quiet);

    let summary = &report.summary;
    let verdict = format!(
        "{}/{} requests succeeded",
        summary.successful_requests, summary.total_requests
    );
    output::notice(
        &output::paint(&verdict, summary.failed_requests == 0),
        global.quiet,
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn parse(argv: &[&str]) -> LoadTestArgs {
        let mut full = vec!["routerbench", "load-test"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::LoadTest(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_override_the_config_section() {
        let args = parse(&["-r", "40", "-c", "8", "-p", "ALL", "-d", "big.json", "--mac", "aa-bb"]);
        let run = run_config(&args, &Config::default()).unwrap();
        assert_eq!(run.total_requests, 40);
        assert_eq!(run.concurrency, 8);
        assert_eq!(run.pattern, PatternSelector::Mixed);
        assert_eq!(run.dataset_name, "big.json");
        assert_eq!(run.device_address, "aa-bb");
        assert_eq!(run.timeout, Duration::from_secs(60));
    }

    #[test]
    fn unset_flags_keep_the_defaults() {
        let run = run_config(&parse(&[]), &Config::default()).unwrap();
        assert_eq!(run.total_requests, 100);
        assert_eq!(run.concurrency, 10);
        assert_eq!(run.pattern, PatternSelector::A);
    }

    #[test]
    fn labels_name_letter_and_pattern() {
        assert_eq!(pattern_label(PatternSelector::B), "B (streaming)");
        assert_eq!(pattern_label(PatternSelector::Mixed), "mixed (A, B, C)");
    }

    #[test]
    fn detail_hides_ttfb_without_successes() {
        let summary = LoadTestSummary {
            total_requests: 2,
            failed_requests: 2,
            ..LoadTestSummary::default()
        };
        let report = RunReport {
            base_url: "http://localhost:8000/",
            pattern: PatternSelector::C,
            dataset_name: "d.json",
            mac_address: "aa",
            concurrency: 2,
            timeout_secs: 60,
            summary: &summary,
        };
        let text = detail(&report);
        assert!(text.contains("Results"));
        assert!(text.contains("2 (100.0%)"));
        assert!(!text.contains("Time to first byte"));
    }
}
