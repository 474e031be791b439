use serde::Deserialize;

use crate::changelog::ChangeLoggingWindowStore;
use crate::error::EngineError;
use winstore_api::WindowStore;

/// Configuration of one change-logged window store, parsed from TOML or JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WindowStoreConfig {
    /// Store name; also part of the change-log topic name.
    pub name: String,

    #[serde(default = "default_application_id")]
    pub application_id: String,

    /// Task partition the store belongs to.
    #[serde(default)]
    pub partition: i32,

    /// Keep every write to a window instead of overwriting.
    #[serde(default)]
    pub retain_duplicates: bool,

    #[serde(default = "default_window_size_ms")]
    pub window_size_ms: i64,

    /// Windows older than this behind stream time are dropped.
    #[serde(default = "default_retention_ms")]
    pub retention_ms: i64,

    /// Capacity of the change-log hand-off channel.
    #[serde(default = "default_changelog_buffer")]
    pub changelog_buffer: usize,
}

fn default_application_id() -> String {
    "winstore".to_string()
}

fn default_window_size_ms() -> i64 {
    60_000
}

fn default_retention_ms() -> i64 {
    86_400_000
}

fn default_changelog_buffer() -> usize {
    1024
}

impl WindowStoreConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.is_empty() {
            return Err(EngineError::Config("store name must not be empty".to_string()));
        }
        if self.window_size_ms <= 0 {
            return Err(EngineError::Config(format!(
                "store '{}': window_size_ms must be positive, got {}",
                self.name, self.window_size_ms
            )));
        }
        if self.retention_ms < self.window_size_ms {
            return Err(EngineError::Config(format!(
                "store '{}': retention_ms ({}) must not be smaller than window_size_ms ({})",
                self.name, self.retention_ms, self.window_size_ms
            )));
        }
        if self.changelog_buffer == 0 {
            return Err(EngineError::Config(format!(
                "store '{}': changelog_buffer must be positive",
                self.name
            )));
        }
        Ok(())
    }

    /// Wrap `inner` in a change-logging decorator configured from this config.
    pub fn decorate<S: WindowStore>(&self, inner: S) -> ChangeLoggingWindowStore<S> {
        ChangeLoggingWindowStore::new(inner, self.retain_duplicates).with_retention(self.retention_ms)
    }
}
