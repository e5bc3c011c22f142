//! Command dispatch: CLI args -> Router calls -> output formatting.

pub mod config_cmd;
pub mod health;
pub mod hosts;
pub mod load_test;
pub mod metrics;
pub mod request;
pub mod status;

use routerbench_api::RouterClient;

use crate::cli::{Command, GlobalOpts};
use crate::config::Config;
use crate::error::CliError;

/// Dispatch a Router-bound command to its handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Request(args) => request::handle(&args, cfg, global).await,
        Command::Status { request_id } => status::handle(&request_id, cfg, global).await,
        Command::Hosts => hosts::handle(cfg, global).await,
        Command::Health => health::handle(cfg, global).await,
        Command::Metrics(args) => metrics::handle(&args, cfg, global),
        Command::LoadTest(args) => load_test::handle(&args, cfg, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "handled before dispatch".into(),
        }),
    }
}

/// A client for one-off commands, built from the resolved config.
pub fn client(cfg: &Config) -> Result<RouterClient, CliError> {
    Ok(RouterClient::new(
        cfg.base_url()?,
        &cfg.transport(),
        cfg.transfer_options(),
    )?)
}
