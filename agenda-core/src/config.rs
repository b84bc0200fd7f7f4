//! Settings for the agenda core.
//!
//! Read from `~/.config/agenda/config.toml` (optional) and then from
//! `AGENDA_*` environment variables, e.g. `AGENDA_CACHE__TTL=30s`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{AgendaError, AgendaResult};

const DEFAULT_CACHE_TTL: &str = "60s";
const DEFAULT_EVENT_DURATION: &str = "1h";
const DEFAULT_MAX_OCCURRENCES: u16 = 365;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub cache: CacheConfig,
    pub recurrence: RecurrenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How long a loaded value stays fresh (humantime, e.g. `"60s"`).
    pub ttl: String,
}

impl CacheConfig {
    pub fn ttl(&self) -> AgendaResult<Duration> {
        parse_duration("cache.ttl", &self.ttl)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl: DEFAULT_CACHE_TTL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecurrenceConfig {
    /// Length given to a replacement occurrence when the series has no end.
    pub default_duration: String,
    pub max_occurrences: u16,
}

impl RecurrenceConfig {
    pub fn default_duration(&self) -> AgendaResult<Duration> {
        parse_duration("recurrence.default_duration", &self.default_duration)
    }
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        RecurrenceConfig {
            default_duration: DEFAULT_EVENT_DURATION.to_string(),
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Settings {
    pub fn config_path() -> AgendaResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AgendaError::Config("Could not determine config directory".into()))?
            .join("agenda");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default config path and the environment.
    pub fn load() -> AgendaResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path` (which may not exist) and the environment.
    pub fn load_from(path: &Path) -> AgendaResult<Self> {
        let settings: Settings = Config::builder()
            .set_default("cache.ttl", DEFAULT_CACHE_TTL)
            .and_then(|b| b.set_default("recurrence.default_duration", DEFAULT_EVENT_DURATION))
            .and_then(|b| b.set_default("recurrence.max_occurrences", i64::from(DEFAULT_MAX_OCCURRENCES)))
            .and_then(|b| b.set_default("logging.level", DEFAULT_LOG_LEVEL))
            .map_err(|e| AgendaError::Config(e.to_string()))?
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("AGENDA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AgendaError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AgendaError::Config(e.to_string()))?;

        settings.validate()?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Check that every duration parses.
    pub fn validate(&self) -> AgendaResult<()> {
        self.cache.ttl()?;
        self.recurrence.default_duration()?;
        Ok(())
    }

    /// Write a config file with every option commented out.
    pub fn create_default_config(path: &Path) -> AgendaResult<()> {
        let contents = format!(
            "\
# agenda configuration

[cache]
# How long loaded events stay cached:
# ttl = \"{DEFAULT_CACHE_TTL}\"

[recurrence]
# Length of a moved occurrence when its series has no end time:
# default_duration = \"{DEFAULT_EVENT_DURATION}\"
# max_occurrences = {DEFAULT_MAX_OCCURRENCES}

[logging]
# level = \"{DEFAULT_LOG_LEVEL}\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AgendaError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| AgendaError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

fn parse_duration(key: &str, value: &str) -> AgendaResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| AgendaError::Config(format!("{key} = '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(settings.cache.ttl().unwrap(), Duration::from_secs(60));
        assert_eq!(
            settings.recurrence.default_duration().unwrap(),
            Duration::from_secs(3600)
        );
        assert_eq!(settings.recurrence.max_occurrences, 365);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[cache]\nttl = \"5m\"\n\n[recurrence]\ndefault_duration = \"30min\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.cache.ttl().unwrap(), Duration::from_secs(300));
        assert_eq!(
            settings.recurrence.default_duration().unwrap(),
            Duration::from_secs(1800)
        );
        assert_eq!(settings.recurrence.max_occurrences, 365);
    }

    #[test]
    fn test_bad_duration_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\nttl = \"soon\"\n").unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(AgendaError::Config(_))
        ));
    }

    #[test]
    fn test_default_config_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agenda").join("config.toml");
        Settings::create_default_config(&path).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.cache.ttl, DEFAULT_CACHE_TTL);
    }
}
