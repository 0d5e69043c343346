pub mod check;
pub mod convert;
pub mod test_rpc;

use crate::config::{AppConfig, BitcoinRpcConfig};
use crate::errors::AppResult;
use tracing::{info, warn};

/// Load config.toml and environment, falling back to defaults
pub(crate) fn load_config() -> AppResult<AppConfig> {
    match AppConfig::load() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            Ok(config)
        }
        Err(e) => {
            warn!("Failed to load configuration: {}", e);
            info!("Using defaults and CLI arguments");
            Ok(AppConfig::get_defaults()?)
        }
    }
}

/// Apply `--rpc-*` flags on top of loaded settings
pub(crate) fn override_rpc(
    rpc_config: &mut BitcoinRpcConfig,
    url: &Option<String>,
    username: &Option<String>,
    password: &Option<String>,
) {
    if let Some(url) = url {
        rpc_config.url = url.clone();
    }
    if let Some(username) = username {
        rpc_config.username = username.clone();
    }
    if let Some(password) = password {
        rpc_config.password = password.clone();
    }
}
