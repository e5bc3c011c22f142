mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::LogFormat;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = config::load_or_default(&cli.global);
    init_tracing(cli.global.verbose, &cfg.logging.level, cfg.logging.format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// `RUST_LOG` wins, then `-v`, then `logging.level` from the config file.
fn init_tracing(verbosity: u8, configured: &str, format: LogFormat) {
    let fallback = match verbosity {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands work without a valid config
        Command::Config(args) => commands::config_cmd::handle(&args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "routerbench", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = config::load_with_overrides(&cli.global)?;
            tracing::debug!(command = ?cmd, url = %cfg.router.base_url, "dispatching command");
            commands::dispatch(cmd, &cfg, &cli.global).await
        }
    }
}
