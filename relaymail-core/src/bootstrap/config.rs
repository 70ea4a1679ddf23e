//! Configuration loading

use anyhow::{Context, Result};
use tracing::info;

use crate::Config;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "RELAYMAIL_CONFIG_PATH";

/// Locations probed when no config file is named
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config.yaml", "/config/config.yaml"];

/// Load configuration from a config file or environment variables
///
/// Config file search order:
/// 1. `explicit` (from the command line)
/// 2. `RELAYMAIL_CONFIG_PATH` environment variable
/// 3. ./config.yaml (current working directory)
/// 4. /config/config.yaml (container mount path)
/// 5. Fall back to environment variables only
///
/// A file named by 1 or 2 must exist and parse. The default locations are
/// optional, and a default file that fails to parse falls back to the
/// environment.
pub fn load_config(explicit: Option<&str>) -> Result<Config> {
    let requested = explicit
        .map(str::to_string)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok());

    let config = if let Some(path) = requested {
        eprintln!("Loading config from {path}");
        Config::from_file(&path).with_context(|| format!("Failed to load config file {path}"))?
    } else if let Some(path) = DEFAULT_CONFIG_PATHS
        .into_iter()
        .find(|p| std::path::Path::new(p).is_file())
    {
        eprintln!("Loading config from {path}");
        match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load {path}: {e}");
                eprintln!("Falling back to environment variables");
                Config::from_env()?
            }
        }
    } else {
        Config::from_env()?
    };

    if let Err(errors) = config.validate() {
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    info!(relay = %config.email.relay_address(), "Configuration loaded and validated");
    Ok(config)
}
