//! Runtime configuration (selene.toml)
//!
//! One [`RuntimeConfig`] describes how interpreters, transfers, threads and
//! their event loops behave. Every section and field is optional in TOML;
//! missing ones take their defaults.
//!
//! ```toml
//! [interpreter]
//! max_call_depth = 120
//!
//! [transfer]
//! relocate_closures = false
//!
//! [threads]
//! name_prefix = "worker"
//! stack_size = 4194304
//!
//! [event_loop]
//! idle_slice_ms = 20
//!
//! [logging]
//! level = "debug"
//! ```

use crate::event::LoopOptions;
use crate::transfer::TransferPolicy;
use crate::vm::{Interpreter, InterpreterOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// OS thread settings for spawned Threads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadOptions {
    /// Prefix of generated thread names, followed by `-<id>`
    pub name_prefix: String,
    /// OS thread stack size in bytes; platform default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_size: Option<usize>,
}

impl Default for ThreadOptions {
    fn default() -> Self {
        Self {
            name_prefix: "selene-thread".to_string(),
            stack_size: None,
        }
    }
}

/// Log output settings used by [`crate::logging::init_from`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// One of `error`, `warn`, `info`, `debug`, `trace`
    pub level: String,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingOptions {
    /// Parsed level, or `None` if `level` is not a known name
    pub fn max_level(&self) -> Option<tracing::Level> {
        self.level.parse().ok()
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interpreter limits
    pub interpreter: InterpreterOptions,
    /// Value transfer between interpreters
    pub transfer: TransferPolicy,
    /// Spawned OS threads
    pub threads: ThreadOptions,
    /// Default event loop tuning
    pub event_loop: LoopOptions,
    /// Log output
    pub logging: LoggingOptions,
}

impl RuntimeConfig {
    /// Parse a configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interpreter.max_call_depth == 0 {
            return Err(ConfigError::Invalid(
                "interpreter.max_call_depth must be positive".to_string(),
            ));
        }
        if self.transfer.max_depth == 0 {
            return Err(ConfigError::Invalid("transfer.max_depth must be positive".to_string()));
        }
        if self.event_loop.max_events_per_step == 0 {
            return Err(ConfigError::Invalid(
                "event_loop.max_events_per_step must be positive".to_string(),
            ));
        }
        if self.logging.max_level().is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown logging.level: {}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Configuration `interp` was created with, or the defaults
pub fn current(interp: &Interpreter) -> Arc<RuntimeConfig> {
    interp.app_data::<Arc<RuntimeConfig>>().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.threads.name_prefix, "selene-thread");
        assert_eq!(config.event_loop.idle_slice_ms, 50);
        assert!(config.transfer.relocate_closures);
    }

    #[test]
    fn test_partial_sections() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [transfer]
            relocate_closures = false

            [threads]
            stack_size = 1048576
            "#,
        )
        .unwrap();
        assert!(!config.transfer.relocate_closures);
        assert!(config.transfer.use_destination_globals);
        assert_eq!(config.threads.stack_size, Some(1048576));
        assert_eq!(config.threads.name_prefix, "selene-thread");
    }

    #[test]
    fn test_invalid_values() {
        let err = RuntimeConfig::from_toml_str("[interpreter]\nmax_call_depth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = RuntimeConfig::from_toml_str("[logging]\nlevel = \"loud\"").unwrap_err();
        assert!(err.to_string().contains("loud"));

        let err = RuntimeConfig::from_toml_str("[threads]\nname_prefix = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = RuntimeConfig::default();
        config.threads.name_prefix = "worker".to_string();
        config.logging.level = "debug".to_string();
        let text = config.to_toml_string().unwrap();
        assert_eq!(RuntimeConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_current_falls_back_to_defaults() {
        let interp = Interpreter::new();
        assert_eq!(*current(&interp), RuntimeConfig::default());

        let mut config = RuntimeConfig::default();
        config.interpreter.max_call_depth = 50;
        let interp = Interpreter::configured(Arc::new(config));
        assert_eq!(current(&interp).interpreter.max_call_depth, 50);
        assert_eq!(interp.options().max_call_depth, 50);
    }
}
