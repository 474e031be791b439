use bytes::Bytes;

use crate::position::Position;

/// One entry of a store's change log.
///
/// `key` is the binary store key (raw key, window start, sequence),
/// `value = None` is a tombstone. `position` travels next to the record so
/// that consumers can rebuild consistency state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLogRecord {
    pub topic: String,
    pub partition: i32,
    pub key: Bytes,
    pub value: Option<Bytes>,
    /// Timestamp of the write, in milliseconds.
    pub timestamp: i64,
    pub position: Position,
}

impl ChangeLogRecord {
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}
