// ════════════════════════════════════════════════════════════════
//  Configuration
// ════════════════════════════════════════════════════════════════

fn default_window_size_ms() -> i64 {
    60_000
}

fn default_retention_ms() -> i64 {
    86_400_000
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct MemoryWindowStoreConfig {
    pub name: String,
    #[serde(default = "default_window_size_ms")]
    pub window_size_ms: i64,
    #[serde(default = "default_retention_ms")]
    pub retention_ms: i64,
    #[serde(default)]
    pub retain_duplicates: bool,
}

impl MemoryWindowStoreConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            window_size_ms: default_window_size_ms(),
            retention_ms: default_retention_ms(),
            retain_duplicates: false,
        }
    }

    pub fn with_window_size(mut self, window_size_ms: i64) -> Self {
        self.window_size_ms = window_size_ms;
        self
    }

    pub fn with_retention(mut self, retention_ms: i64) -> Self {
        self.retention_ms = retention_ms;
        self
    }

    pub fn with_retain_duplicates(mut self, retain_duplicates: bool) -> Self {
        self.retain_duplicates = retain_duplicates;
        self
    }
}
