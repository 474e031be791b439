use bytes::Bytes;

use crate::error::StoreError;
use crate::position::Position;
use crate::store::StoreHandle;

/// Metadata of the input record currently being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordContext {
    pub timestamp: i64,
    pub offset: i64,
    pub partition: i32,
    pub topic: String,
    pub headers: Vec<(String, Bytes)>,
}

impl RecordContext {
    pub fn new(timestamp: i64, offset: i64, partition: i32, topic: impl Into<String>) -> Self {
        Self {
            timestamp,
            offset,
            partition,
            topic: topic.into(),
            headers: Vec::new(),
        }
    }
}

/// Runtime services a store sees after `init`.
///
/// Stores never mutate the record context; they read it and hand change-log
/// records off through `log_change`.
pub trait StoreContext: Send + Sync {
    /// Called once by the innermost store during `init`.
    fn register_store(&self, _store: &StoreHandle) -> Result<(), StoreError> {
        Ok(())
    }

    /// The record in flight, if any.
    fn record_context(&self) -> Option<RecordContext>;

    /// Hand one change-log record to the change-log writer.
    ///
    /// Fire-and-forget: must not block. `value = None` is a tombstone.
    fn log_change(
        &self,
        store_name: &str,
        key: &Bytes,
        value: Option<&Bytes>,
        timestamp: i64,
        position: &Position,
    ) -> Result<(), StoreError>;
}
