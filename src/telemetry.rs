//! Logging setup
//!
//! Installs a global `tracing` subscriber configured from
//! [`LoggingConfig`]. `RUST_LOG`, when set, takes precedence over the
//! configured level.

use brook_core::config::{LogFormat, LoggingConfig};
use brook_core::{BrookError, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Build the filter described by `config.level`.
///
/// Accepts anything `EnvFilter` does: a bare level, `target=level` pairs,
/// or a comma separated list of both.
pub fn parse_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    config.validate()?;
    EnvFilter::try_new(&config.level).map_err(|e| {
        BrookError::Config(format!("Invalid log filter '{}': {e}", config.level))
    })
}

/// Install the global log subscriber.
///
/// Fails instead of panicking when a subscriber is already installed, so
/// embedding applications and tests can call it more than once.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let configured = parse_filter(config)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or(configured);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    installed.map_err(|e| BrookError::Config(format!("Failed to install log subscriber: {e}")))
}
