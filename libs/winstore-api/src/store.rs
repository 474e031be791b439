use std::sync::Arc;

use bytes::Bytes;

use crate::context::StoreContext;
use crate::error::StoreError;
use crate::iter::{WindowStoreIterator, WindowedIterator};
use crate::position::Position;

/// Identity of the outermost store of a decorator stack.
///
/// Passed down unchanged through `init` so the innermost store registers
/// under the name callers actually use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHandle {
    pub name: String,
    pub persistent: bool,
}

impl StoreHandle {
    pub fn new(name: impl Into<String>, persistent: bool) -> Self {
        Self {
            name: name.into(),
            persistent,
        }
    }
}

/// Windowed byte store.
///
/// Keys and values are already-serialized bytes. Every entry belongs to the
/// window identified by its start timestamp (epoch ms, non-negative).
///
/// Lifecycle: `init` exactly once, then reads and writes, then `close`.
/// Calling anything else before `init` or after `close` is a usage error.
///
/// Inverted ranges (`time_from > time_to`, `key_from > key_to`) yield an
/// empty cursor, never an error. Range bounds are inclusive; `None` key bounds
/// are open-ended.
pub trait WindowStore: Send {
    fn name(&self) -> &str;

    fn persistent(&self) -> bool;

    fn is_open(&self) -> bool;

    /// Initialize with context. `root` is the outermost store of the stack.
    fn init(&mut self, context: Arc<dyn StoreContext>, root: &StoreHandle) -> Result<(), StoreError>;

    /// Upsert into the window starting at `window_start`. `None` deletes.
    ///
    /// With duplicates retained every call adds a distinct entry and deletes
    /// are ignored. The write is applied before this returns.
    fn put(&mut self, key: &Bytes, value: Option<Bytes>, window_start: i64) -> Result<(), StoreError>;

    /// Value of `key` in the window starting exactly at `window_start`.
    fn fetch_one(&self, key: &Bytes, window_start: i64) -> Result<Option<Bytes>, StoreError>;

    /// Windows of `key` starting in `[time_from, time_to]`, ascending.
    fn fetch(&self, key: &Bytes, time_from: i64, time_to: i64) -> Result<WindowStoreIterator, StoreError>;

    /// Same result set as `fetch`, descending.
    fn backward_fetch(&self, key: &Bytes, time_from: i64, time_to: i64) -> Result<WindowStoreIterator, StoreError>;

    /// Keys in `[key_from, key_to]` with windows starting in
    /// `[time_from, time_to]`, ascending by (key, window start).
    fn fetch_range(
        &self,
        key_from: Option<&Bytes>,
        key_to: Option<&Bytes>,
        time_from: i64,
        time_to: i64,
    ) -> Result<WindowedIterator, StoreError>;

    /// Same result set as `fetch_range`, descending.
    fn backward_fetch_range(
        &self,
        key_from: Option<&Bytes>,
        key_to: Option<&Bytes>,
        time_from: i64,
        time_to: i64,
    ) -> Result<WindowedIterator, StoreError>;

    /// All keys with windows starting in `[time_from, time_to]`, ascending by
    /// (window start, key).
    fn fetch_all(&self, time_from: i64, time_to: i64) -> Result<WindowedIterator, StoreError>;

    fn backward_fetch_all(&self, time_from: i64, time_to: i64) -> Result<WindowedIterator, StoreError>;

    /// Every live entry, ascending by (window start, key).
    fn all(&self) -> Result<WindowedIterator, StoreError>;

    fn backward_all(&self) -> Result<WindowedIterator, StoreError>;

    /// Input offsets reflected by all writes applied so far.
    fn position(&self) -> Result<Position, StoreError>;

    fn flush(&mut self) -> Result<(), StoreError>;

    fn close(&mut self) -> Result<(), StoreError>;
}
