//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::error::{AgendaError, AgendaResult};

/// Build the filter for a configured level. `RUST_LOG` wins when set.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(&config.level))
}

/// Parse a level or directive string, falling back to `info`.
pub fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|e| {
        // No subscriber yet, so this can't go through tracing.
        eprintln!("Invalid log level '{level}' ({e}), using info");
        EnvFilter::new("info")
    })
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> AgendaResult<()> {
    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| AgendaError::Config(format!("Could not install log subscriber: {e}")))?;

    tracing::debug!(level = %config.level, "Logging initialized");
    Ok(())
}
