pub mod changelog;
pub mod collector;
pub mod config;
pub mod error;
pub mod key_schema;
mod sequence;

pub use changelog::ChangeLoggingWindowStore;
pub use collector::{ChangelogCollector, changelog_topic};
pub use config::WindowStoreConfig;
pub use error::EngineError;
