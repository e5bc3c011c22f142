//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::active_path(global);

    match &args.command {
        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_with_overrides(global)?;
            let out = output::render_single(global.output_format, &cfg, |c| {
                config::render(c, &path).unwrap_or_else(|e| format!("# {e}"))
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            if !path.is_file() {
                output::notice("(file does not exist, defaults apply)", global.quiet);
            }
            Ok(())
        }

        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init { force } => {
            if path.exists() && !*force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            config::save_config(&Config::default(), &path)?;
            tracing::info!(path = %path.display(), "config written");
            output::notice(
                &format!("{} Wrote {}", output::paint("✓", true), path.display()),
                global.quiet,
            );
            Ok(())
        }
    }
}
