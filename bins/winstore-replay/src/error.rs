use winstore_api::StoreError;
use winstore_engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("line {line}: {source}")]
    Op { line: usize, source: StoreError },

    #[error("{failed} change-log record(s) could not be handed off")]
    ChangelogLost { failed: usize },

    #[error("input line {line}: {detail}")]
    Input { line: usize, detail: String },

    #[error("decode: {0}")]
    Decode(String),

    #[error("output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
