//! `hosts`: connectors attached to the Router.

use tabled::Tabled;

use routerbench_api::Connector;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::config::Config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ConnectorRow {
    #[tabled(rename = "MAC Address")]
    mac: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Connected At")]
    connected_at: String,
    #[tabled(rename = "Last Ping")]
    last_ping: String,
}

/// ISO timestamps cut to `YYYY-MM-DDTHH:MM:SS`.
fn short_time(value: Option<&str>) -> String {
    value.map_or_else(
        || "-".into(),
        |v| v.chars().take(19).collect::<String>(),
    )
}

impl From<&Connector> for ConnectorRow {
    fn from(c: &Connector) -> Self {
        Self {
            mac: c.mac_address.clone(),
            status: c.status.clone().unwrap_or_else(|| "-".into()),
            connected_at: short_time(c.connected_at.as_deref()),
            last_ping: short_time(c.last_ping.as_deref()),
        }
    }
}

fn connector_table(connectors: &[Connector]) -> Result<String, CliError> {
    output::render_list(OutputFormat::Table, connectors, |c| ConnectorRow::from(c))
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let client = super::client(cfg)?;
    let hosts = client.list_active_hosts().await?;

    if global.output_format != OutputFormat::Table {
        let out = output::render_single(global.output_format, &hosts, |_| String::new())?;
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    if hosts.connectors.is_empty() {
        output::notice("No active connectors", global.quiet);
        return Ok(());
    }

    let out = connector_table(&hosts.connectors)?;
    output::print_output(&out, global.quiet);
    output::notice(&format!("{} connector(s) active", hosts.count), global.quiet);
    Ok(())
}
