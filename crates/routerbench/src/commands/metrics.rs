//! `metrics`: headline figures over the metrics CSV.

use routerbench_core::{MetricsLog, MetricsSummary};

use crate::cli::{GlobalOpts, MetricsArgs};
use crate::config::Config;
use crate::error::CliError;
use crate::output;

fn detail(summary: &MetricsSummary) -> String {
    output::key_value_table([
        ("Total requests", summary.count.to_string()),
        ("Successful", summary.successful.to_string()),
        ("Failed", summary.failed.to_string()),
        ("Avg TTFB", output::seconds(Some(summary.avg_ttfb_seconds))),
        ("Min TTFB", output::seconds(Some(summary.min_ttfb_seconds))),
        ("Max TTFB", output::seconds(Some(summary.max_ttfb_seconds))),
        (
            "Avg throughput",
            output::rate(Some(summary.avg_throughput_bytes_per_sec)),
        ),
    ])
}

pub fn handle(args: &MetricsArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let path = args
        .file
        .clone()
        .unwrap_or_else(|| cfg.metrics.output_file.clone());
    if !path.is_file() {
        return Err(CliError::NoMetrics {
            path: path.display().to_string(),
        });
    }

    let entries = MetricsLog::new(&path).load()?;
    if entries.is_empty() {
        return Err(CliError::NoMetrics {
            path: path.display().to_string(),
        });
    }
    tracing::debug!(path = %path.display(), rows = entries.len(), "metrics loaded");

    let summary = MetricsSummary::from_entries(&entries);
    let out = output::render_single(global.output_format, &summary, detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
