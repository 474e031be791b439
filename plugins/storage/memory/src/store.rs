use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;

use winstore_api::{
    KeyValue, KeyValueIterator, Position, SnapshotIterator, StoreContext, StoreError, StoreHandle,
    TimeWindow, WindowStore, WindowStoreIterator, WindowedIterator, WindowedKey,
};

use crate::config::MemoryWindowStoreConfig;

/// `(raw key, window start, sequence)`.
type EntryKey = (Bytes, i64, u32);

// ═══════════════════════════════════════════════════════════════
//  InMemoryWindowStore
// ═══════════════════════════════════════════════════════════════

/// Window store backed by an ordered map.
///
/// Entries are ordered by (key, window start, sequence). Windows that fall
/// more than `retention_ms` behind the newest window written are dropped on
/// write and hidden from reads. The position advances with the record
/// context of every write.
pub struct InMemoryWindowStore {
    name: String,
    window_size: i64,
    retention_period: i64,
    retain_duplicates: bool,
    entries: BTreeMap<EntryKey, Bytes>,
    seqnum: u32,
    observed_stream_time: Option<i64>,
    position: Position,
    context: Option<Arc<dyn StoreContext>>,
    initialized: bool,
    open: bool,
    open_iterators: Arc<AtomicUsize>,
}

impl std::fmt::Debug for InMemoryWindowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryWindowStore")
            .field("name", &self.name)
            .field("window_size", &self.window_size)
            .field("retention_period", &self.retention_period)
            .field("retain_duplicates", &self.retain_duplicates)
            .field("entries", &self.entries)
            .field("seqnum", &self.seqnum)
            .field("observed_stream_time", &self.observed_stream_time)
            .field("position", &self.position)
            .field("initialized", &self.initialized)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl InMemoryWindowStore {
    pub fn new(config: MemoryWindowStoreConfig) -> Result<Self, StoreError> {
        if config.window_size_ms <= 0 {
            return Err(StoreError::config(format!(
                "store '{}': window size must be positive",
                config.name
            )));
        }
        if config.retention_ms < config.window_size_ms {
            return Err(StoreError::config(format!(
                "store '{}': retention period must not be smaller than window size",
                config.name
            )));
        }
        Ok(Self {
            name: config.name,
            window_size: config.window_size_ms,
            retention_period: config.retention_ms,
            retain_duplicates: config.retain_duplicates,
            entries: BTreeMap::new(),
            seqnum: 0,
            observed_stream_time: None,
            position: Position::empty(),
            context: None,
            initialized: false,
            open: false,
            open_iterators: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Cursors handed out and not yet closed or dropped.
    pub fn open_iterator_count(&self) -> usize {
        self.open_iterators.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::usage(format!("store '{}' is not open", self.name)))
        }
    }

    /// Oldest window start still inside retention.
    fn min_live_time(&self) -> i64 {
        self.observed_stream_time.map_or(0, |observed| {
            observed
                .saturating_sub(self.retention_period)
                .saturating_add(1)
                .max(0)
        })
    }

    fn remove_expired(&mut self) {
        let min_live = self.min_live_time();
        let before = self.entries.len();
        self.entries.retain(|(_, start, _), _| *start >= min_live);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(store = %self.name, removed, min_live, "dropped expired windows");
        }
    }

    fn update_position(&mut self) {
        let record = self.context.as_ref().and_then(|c| c.record_context());
        if let Some(record) = record.filter(|r| r.offset >= 0) {
            self.position = self
                .position
                .with_component(&record.topic, record.partition, record.offset);
        }
    }

    fn next_seqnum(&mut self) -> Result<u32, StoreError> {
        self.seqnum = self.seqnum.checked_add(1).ok_or_else(|| {
            StoreError::usage(format!("store '{}': sequence space exhausted", self.name))
        })?;
        Ok(self.seqnum)
    }

    fn windowed(&self, key: &Bytes, start: i64) -> WindowedKey {
        WindowedKey::new(key.clone(), TimeWindow::for_start(start, self.window_size))
    }

    /// Hand out a cursor that decrements the open-iterator count when released.
    fn track<K, V>(&self, rows: Vec<KeyValue<K, V>>) -> Box<dyn KeyValueIterator<K, V>>
    where
        K: Send + 'static,
        V: Send + 'static,
    {
        self.open_iterators.fetch_add(1, Ordering::SeqCst);
        let counter = self.open_iterators.clone();
        SnapshotIterator::new(rows)
            .on_close(move || {
                counter.fetch_sub(1, Ordering::SeqCst);
            })
            .boxed()
    }

    fn key_rows(&self, key: &Bytes, time_from: i64, time_to: i64) -> Vec<KeyValue<i64, Bytes>> {
        let time_from = time_from.max(self.min_live_time());
        if time_from > time_to {
            return Vec::new();
        }
        let lower = (key.clone(), time_from, 0);
        let upper = (key.clone(), time_to, u32::MAX);
        self.entries
            .range(lower..=upper)
            .map(|((_, start, _), value)| KeyValue::pair(*start, value.clone()))
            .collect()
    }

    fn range_rows(
        &self,
        key_from: Option<&Bytes>,
        key_to: Option<&Bytes>,
        time_from: i64,
        time_to: i64,
    ) -> Vec<KeyValue<WindowedKey, Bytes>> {
        if let (Some(from), Some(to)) = (key_from, key_to) {
            if from > to {
                tracing::warn!(
                    store = %self.name,
                    "returning empty iterator for fetch with inverted key range"
                );
                return Vec::new();
            }
        }
        let time_from = time_from.max(self.min_live_time());
        if time_from > time_to {
            return Vec::new();
        }
        let lower = match key_from {
            Some(k) => Bound::Included((k.clone(), i64::MIN, 0)),
            None => Bound::Unbounded,
        };
        let upper = match key_to {
            Some(k) => Bound::Included((k.clone(), i64::MAX, u32::MAX)),
            None => Bound::Unbounded,
        };
        self.entries
            .range((lower, upper))
            .filter(|((_, start, _), _)| (time_from..=time_to).contains(start))
            .map(|((key, start, _), value)| KeyValue::pair(self.windowed(key, *start), value.clone()))
            .collect()
    }

    /// Ordered by (window start, key); duplicates keep insertion order.
    fn time_rows(&self, time_from: i64, time_to: i64) -> Vec<KeyValue<WindowedKey, Bytes>> {
        let time_from = time_from.max(self.min_live_time());
        if time_from > time_to {
            return Vec::new();
        }
        let mut rows: Vec<_> = self
            .entries
            .iter()
            .filter(|((_, start, _), _)| (time_from..=time_to).contains(start))
            .map(|((key, start, _), value)| KeyValue::pair(self.windowed(key, *start), value.clone()))
            .collect();
        rows.sort_by(|a, b| {
            a.key
                .window
                .start
                .cmp(&b.key.window.start)
                .then_with(|| a.key.key.cmp(&b.key.key))
        });
        rows
    }
}

impl WindowStore for InMemoryWindowStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn persistent(&self) -> bool {
        false
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn init(&mut self, context: Arc<dyn StoreContext>, root: &StoreHandle) -> Result<(), StoreError> {
        if self.initialized {
            return Err(StoreError::usage(format!(
                "store '{}' initialized twice",
                self.name
            )));
        }
        context.register_store(root)?;
        self.context = Some(context);
        self.initialized = true;
        self.open = true;
        tracing::info!(
            store = %self.name,
            window_size_ms = self.window_size,
            retention_ms = self.retention_period,
            retain_duplicates = self.retain_duplicates,
            "in-memory window store opened"
        );
        Ok(())
    }

    fn put(&mut self, key: &Bytes, value: Option<Bytes>, window_start: i64) -> Result<(), StoreError> {
        self.ensure_open()?;
        if window_start < 0 {
            return Err(StoreError::usage(format!(
                "store '{}': negative window start {window_start}",
                self.name
            )));
        }

        let observed = self
            .observed_stream_time
            .map_or(window_start, |t| t.max(window_start));
        self.observed_stream_time = Some(observed);
        self.remove_expired();

        if window_start < self.min_live_time() {
            tracing::debug!(store = %self.name, window_start, "skipping record for expired window");
        } else if let Some(value) = value {
            let sequence = if self.retain_duplicates { self.next_seqnum()? } else { 0 };
            self.entries.insert((key.clone(), window_start, sequence), value);
        } else if !self.retain_duplicates {
            self.entries.remove(&(key.clone(), window_start, 0));
        }

        self.update_position();
        Ok(())
    }

    fn fetch_one(&self, key: &Bytes, window_start: i64) -> Result<Option<Bytes>, StoreError> {
        self.ensure_open()?;
        if self.retain_duplicates || window_start < self.min_live_time() {
            return Ok(None);
        }
        Ok(self.entries.get(&(key.clone(), window_start, 0)).cloned())
    }

    fn fetch(&self, key: &Bytes, time_from: i64, time_to: i64) -> Result<WindowStoreIterator, StoreError> {
        self.ensure_open()?;
        Ok(self.track(self.key_rows(key, time_from, time_to)))
    }

    fn backward_fetch(&self, key: &Bytes, time_from: i64, time_to: i64) -> Result<WindowStoreIterator, StoreError> {
        self.ensure_open()?;
        let mut rows = self.key_rows(key, time_from, time_to);
        rows.reverse();
        Ok(self.track(rows))
    }

    fn fetch_range(
        &self,
        key_from: Option<&Bytes>,
        key_to: Option<&Bytes>,
        time_from: i64,
        time_to: i64,
    ) -> Result<WindowedIterator, StoreError> {
        self.ensure_open()?;
        Ok(self.track(self.range_rows(key_from, key_to, time_from, time_to)))
    }

    fn backward_fetch_range(
        &self,
        key_from: Option<&Bytes>,
        key_to: Option<&Bytes>,
        time_from: i64,
        time_to: i64,
    ) -> Result<WindowedIterator, StoreError> {
        self.ensure_open()?;
        let mut rows = self.range_rows(key_from, key_to, time_from, time_to);
        rows.reverse();
        Ok(self.track(rows))
    }

    fn fetch_all(&self, time_from: i64, time_to: i64) -> Result<WindowedIterator, StoreError> {
        self.ensure_open()?;
        Ok(self.track(self.time_rows(time_from, time_to)))
    }

    fn backward_fetch_all(&self, time_from: i64, time_to: i64) -> Result<WindowedIterator, StoreError> {
        self.ensure_open()?;
        let mut rows = self.time_rows(time_from, time_to);
        rows.reverse();
        Ok(self.track(rows))
    }

    fn all(&self) -> Result<WindowedIterator, StoreError> {
        self.fetch_all(0, i64::MAX)
    }

    fn backward_all(&self) -> Result<WindowedIterator, StoreError> {
        self.backward_fetch_all(0, i64::MAX)
    }

    fn position(&self) -> Result<Position, StoreError> {
        self.ensure_open()?;
        Ok(self.position.clone())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let open_iterators = self.open_iterator_count();
        if open_iterators > 0 {
            tracing::warn!(store = %self.name, open_iterators, "closing store with open iterators");
        }
        self.entries.clear();
        self.context = None;
        self.open = false;
        tracing::info!(store = %self.name, "in-memory window store closed");
        Ok(())
    }
}
