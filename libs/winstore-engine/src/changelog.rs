use std::sync::Arc;

use bytes::Bytes;

use winstore_api::{
    Position, StoreContext, StoreError, StoreHandle, WindowStore, WindowStoreIterator,
    WindowedIterator,
};

use crate::key_schema::{self, NO_SEQNUM};
use crate::sequence::SequenceTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
    Closed,
}

/// Window store decorator that mirrors every write into a change log.
///
/// Writes go to the wrapped store first; afterwards one change-log record
/// `(store name, store key, value, timestamp, position)` is handed to the
/// store context. Reads are forwarded untouched and never log.
///
/// With `retain_duplicates`, each write to the same `(key, window start)`
/// bucket is logged under its own sequence (1, 2, ...), so the change log
/// keeps every duplicate. Without it the sequence is always 0 and repeated
/// writes to a bucket share one store key.
///
/// A write that fails after the wrapped store applied it (position read or
/// hand-off) is reported to the caller but not rolled back.
pub struct ChangeLoggingWindowStore<S> {
    inner: S,
    retain_duplicates: bool,
    sequences: SequenceTracker,
    context: Option<Arc<dyn StoreContext>>,
    state: Lifecycle,
}

impl<S: WindowStore> ChangeLoggingWindowStore<S> {
    pub fn new(inner: S, retain_duplicates: bool) -> Self {
        Self {
            inner,
            retain_duplicates,
            sequences: SequenceTracker::new(None),
            context: None,
            state: Lifecycle::Uninitialized,
        }
    }

    /// Forget sequence counters of windows older than `retention_ms` behind
    /// the newest window written so far.
    pub fn with_retention(mut self, retention_ms: i64) -> Self {
        self.sequences = SequenceTracker::new(Some(retention_ms));
        self
    }

    pub fn retain_duplicates(&self) -> bool {
        self.retain_duplicates
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Write with an explicit change-log timestamp.
    ///
    /// `put` uses the timestamp of the record in flight, falling back to
    /// `window_start` when there is none.
    pub fn put_with_timestamp(
        &mut self,
        key: &Bytes,
        value: Option<Bytes>,
        window_start: i64,
        timestamp: i64,
    ) -> Result<(), StoreError> {
        let context = self.context()?;
        if window_start < 0 {
            return Err(StoreError::usage(format!(
                "store '{}': negative window start {window_start}",
                self.inner.name()
            )));
        }
        let sequence = if self.retain_duplicates {
            self.sequences.peek_next(key, window_start)?
        } else {
            NO_SEQNUM
        };

        self.inner.put(key, value.clone(), window_start)?;
        if self.retain_duplicates {
            self.sequences.commit(key, window_start, sequence);
        }

        let store_key = key_schema::to_store_key_binary(key, window_start, sequence);
        let position = self.inner.position()?;
        tracing::debug!(
            store = %self.inner.name(),
            window_start,
            sequence,
            tombstone = value.is_none(),
            "logging change"
        );
        context
            .log_change(self.inner.name(), &store_key, value.as_ref(), timestamp, &position)
            .inspect_err(|e| {
                tracing::warn!(
                    store = %self.inner.name(),
                    error = %e,
                    "write applied locally but change-log hand-off failed"
                );
            })
    }

    fn context(&self) -> Result<Arc<dyn StoreContext>, StoreError> {
        self.ensure_open()?;
        self.context
            .clone()
            .ok_or_else(|| StoreError::usage(format!("store '{}' has no context", self.inner.name())))
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        match self.state {
            Lifecycle::Initialized => Ok(()),
            Lifecycle::Uninitialized => Err(StoreError::usage(format!(
                "store '{}' is not initialized",
                self.inner.name()
            ))),
            Lifecycle::Closed => Err(StoreError::usage(format!(
                "store '{}' is closed",
                self.inner.name()
            ))),
        }
    }
}

impl<S: WindowStore> WindowStore for ChangeLoggingWindowStore<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn persistent(&self) -> bool {
        self.inner.persistent()
    }

    fn is_open(&self) -> bool {
        self.state == Lifecycle::Initialized && self.inner.is_open()
    }

    fn init(&mut self, context: Arc<dyn StoreContext>, root: &StoreHandle) -> Result<(), StoreError> {
        if self.state != Lifecycle::Uninitialized {
            return Err(StoreError::usage(format!(
                "store '{}' initialized twice",
                self.inner.name()
            )));
        }
        self.inner.init(context.clone(), root)?;
        self.context = Some(context);
        self.state = Lifecycle::Initialized;
        tracing::info!(
            store = %self.inner.name(),
            root = %root.name,
            retain_duplicates = self.retain_duplicates,
            "change-logging window store initialized"
        );
        Ok(())
    }

    fn put(&mut self, key: &Bytes, value: Option<Bytes>, window_start: i64) -> Result<(), StoreError> {
        let timestamp = self
            .context()?
            .record_context()
            .map_or(window_start, |record| record.timestamp);
        self.put_with_timestamp(key, value, window_start, timestamp)
    }

    fn fetch_one(&self, key: &Bytes, window_start: i64) -> Result<Option<Bytes>, StoreError> {
        self.ensure_open()?;
        self.inner.fetch_one(key, window_start)
    }

    fn fetch(&self, key: &Bytes, time_from: i64, time_to: i64) -> Result<WindowStoreIterator, StoreError> {
        self.ensure_open()?;
        self.inner.fetch(key, time_from, time_to)
    }

    fn backward_fetch(&self, key: &Bytes, time_from: i64, time_to: i64) -> Result<WindowStoreIterator, StoreError> {
        self.ensure_open()?;
        self.inner.backward_fetch(key, time_from, time_to)
    }

    fn fetch_range(
        &self,
        key_from: Option<&Bytes>,
        key_to: Option<&Bytes>,
        time_from: i64,
        time_to: i64,
    ) -> Result<WindowedIterator, StoreError> {
        self.ensure_open()?;
        self.inner.fetch_range(key_from, key_to, time_from, time_to)
    }

    fn backward_fetch_range(
        &self,
        key_from: Option<&Bytes>,
        key_to: Option<&Bytes>,
        time_from: i64,
        time_to: i64,
    ) -> Result<WindowedIterator, StoreError> {
        self.ensure_open()?;
        self.inner.backward_fetch_range(key_from, key_to, time_from, time_to)
    }

    fn fetch_all(&self, time_from: i64, time_to: i64) -> Result<WindowedIterator, StoreError> {
        self.ensure_open()?;
        self.inner.fetch_all(time_from, time_to)
    }

    fn backward_fetch_all(&self, time_from: i64, time_to: i64) -> Result<WindowedIterator, StoreError> {
        self.ensure_open()?;
        self.inner.backward_fetch_all(time_from, time_to)
    }

    fn all(&self) -> Result<WindowedIterator, StoreError> {
        self.ensure_open()?;
        self.inner.all()
    }

    fn backward_all(&self) -> Result<WindowedIterator, StoreError> {
        self.ensure_open()?;
        self.inner.backward_all()
    }

    fn position(&self) -> Result<Position, StoreError> {
        self.ensure_open()?;
        self.inner.position()
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.inner.flush()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.state = Lifecycle::Closed;
        self.context = None;
        self.sequences.clear();
        tracing::info!(store = %self.inner.name(), "change-logging window store closed");
        self.inner.close()
    }
}
