//! Tracing subscriber setup for binaries.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;
use crate::{LicitaError, Result};

/// Installs the global subscriber. `LICITA_LOG` wins over the configured level.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_env("LICITA_LOG")
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LicitaError::Config(format!("invalid log filter: {}", e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| LicitaError::Config(format!("tracing already initialized: {}", e)))
}
