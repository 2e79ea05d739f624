//! Configuration loading utilities for the proxy.

use std::path::Path;

use eyre::WrapErr as _;
use tokio::fs;

use crate::config::ProxyConfig;

/// Reads and parses the proxy config from a TOML file.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed.
pub(crate) async fn load<P: AsRef<Path>>(path: P) -> eyre::Result<ProxyConfig> {
    let path_ref = path.as_ref();
    let content = fs::read_to_string(&path).await.wrap_err(format!(
        "Failed to read config file at: {}",
        path_ref.display()
    ))?;
    let config: ProxyConfig = toml::from_str(&content).wrap_err(format!(
        "Failed to parse config as TOML at: {}",
        path_ref.display()
    ))?;
    Ok(config)
}
