//! Tracing subscriber setup for the `pgw` binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::error::{AppError, Result};

/// Filter from `RUST_LOG`, falling back to the configured level.
pub fn build_env_filter(config: &AppConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    filter_for(config.log_level())
}

fn filter_for(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| AppError::Config(format!("invalid log level {:?}: {}", directives, e)))
}

/// Install the global subscriber, writing to stderr. Calling it twice is
/// harmless; the first subscriber stays.
pub fn init(config: &AppConfig) -> Result<()> {
    let filter = build_env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json_logs() {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };

    if installed.is_ok() {
        tracing::debug!(json = config.json_logs(), "tracing initialized");
    }
    Ok(())
}
