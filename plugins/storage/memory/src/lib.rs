mod config;
mod store;

pub use config::MemoryWindowStoreConfig;
pub use store::InMemoryWindowStore;

use winstore_api::StoreError;

// ═══════════════════════════════════════════════════════════════
//  Factory
// ═══════════════════════════════════════════════════════════════

/// Create an in-memory window store from a JSON config.
pub fn create_window_store(config_json: &str) -> Result<InMemoryWindowStore, StoreError> {
    let config: MemoryWindowStoreConfig = serde_json::from_str(config_json)
        .map_err(|e| StoreError::config(format!("memory window store config: {e}")))?;
    InMemoryWindowStore::new(config)
}
