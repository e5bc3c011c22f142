//! `status`: the Router's view of one request.

use routerbench_api::StatusResponse;

use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::error::CliError;
use crate::output;

fn detail(status: &StatusResponse) -> String {
    let mut rows = vec![
        (
            "Request ID",
            status.request_id.clone().unwrap_or_else(|| "-".into()),
        ),
        ("Status", format!("{:?}", status.status).to_lowercase()),
        (
            "Size",
            status
                .payload_size()
                .map_or_else(|| "-".into(), output::bytes),
        ),
    ];
    if let Some(ref url) = status.download_url {
        rows.push(("Download URL", url.clone()));
    }
    if let Some(ref message) = status.error_message {
        rows.push(("Error", message.clone()));
    }
    if let Some(ts) = status.timestamps {
        rows.push(("Router latency", output::seconds(ts.router_latency())));
        rows.push(("Connector latency", output::seconds(ts.connector_latency())));
    }
    output::key_value_table(rows)
}

pub async fn handle(request_id: &str, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let client = super::client(cfg)?;
    let status = client.get_status(request_id).await?;

    let out = output::render_single(global.output_format, &status, detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
