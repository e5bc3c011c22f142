//! `health`: is the Router answering at all?

use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::error::CliError;
use crate::output;

pub async fn handle(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let client = super::client(cfg)?;
    let url = client.base_url().to_string();

    if !client.health_check().await {
        return Err(CliError::ConnectionFailed { url });
    }

    let message = format!("{} Router at {url} is healthy", output::paint("✓", true));
    output::notice(&message, global.quiet);
    Ok(())
}
