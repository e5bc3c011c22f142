//! Configuration as the CLI sees it: the config crate plus flag overrides.

use std::path::PathBuf;

pub use routerbench_config::{Config, LogFormat, load_config, render, resolve_path, save_config};

use crate::cli::{self, GlobalOpts};
use crate::error::CliError;

/// The file `--config` (or the default lookup) points at.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    resolve_path(global.config.as_deref())
}

/// Load the config file, then lay `--url`, `--timeout`, `--insecure` and
/// `--log-format` over it.
pub fn load_with_overrides(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = load_config(global.config.as_deref())?;
    apply_overrides(&mut cfg, global);
    cfg.validate()?;
    Ok(cfg)
}

/// Loads the file if it parses, defaults otherwise. Logging must come up
/// before the real load reports its error.
pub fn load_or_default(global: &GlobalOpts) -> Config {
    let mut cfg = load_config(global.config.as_deref()).unwrap_or_default();
    apply_overrides(&mut cfg, global);
    cfg
}

fn apply_overrides(cfg: &mut Config, global: &GlobalOpts) {
    if let Some(ref url) = global.url {
        cfg.router.base_url.clone_from(url);
    }
    if let Some(timeout) = global.timeout {
        cfg.router.timeout = timeout;
    }
    if global.insecure {
        cfg.router.insecure = true;
    }
    if let Some(format) = global.log_format {
        cfg.logging.format = match format {
            cli::LogFormat::Text => LogFormat::Text,
            cli::LogFormat::Json => LogFormat::Json,
        };
    }
}
