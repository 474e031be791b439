use bytes::Bytes;

/// Half-open time bucket `[start, end)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Window of `size` ms starting at `start`. The end saturates at `i64::MAX`.
    pub fn for_start(start: i64, size: i64) -> Self {
        Self {
            start,
            end: start.saturating_add(size),
        }
    }
}

/// A raw key together with the window it was aggregated in.
///
/// Ordered by key first, then window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowedKey {
    pub key: Bytes,
    pub window: TimeWindow,
}

impl WindowedKey {
    pub fn new(key: Bytes, window: TimeWindow) -> Self {
        Self { key, window }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> KeyValue<K, V> {
    pub fn pair(key: K, value: V) -> Self {
        Self { key, value }
    }
}
