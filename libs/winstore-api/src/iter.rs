use std::iter::Peekable;
use std::vec;

use bytes::Bytes;

use crate::window::{KeyValue, WindowedKey};

/// Lazy, finite cursor over a store.
///
/// A cursor may hold resources of the backing store. They are released by
/// `close()` or, on every other exit path, when the cursor is dropped.
/// After `close()` the cursor yields nothing.
pub trait KeyValueIterator<K, V>: Iterator<Item = KeyValue<K, V>> + Send {
    fn peek_next_key(&mut self) -> Option<&K>;

    fn close(&mut self);
}

/// `(window start, value)` pairs of a single key.
pub type WindowStoreIterator = Box<dyn KeyValueIterator<i64, Bytes>>;

/// `(windowed key, value)` pairs across keys.
pub type WindowedIterator = Box<dyn KeyValueIterator<WindowedKey, Bytes>>;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Cursor over a materialized result set with an optional release hook.
pub struct SnapshotIterator<K, V> {
    items: Peekable<vec::IntoIter<KeyValue<K, V>>>,
    on_close: Option<ReleaseHook>,
}

impl<K, V> SnapshotIterator<K, V> {
    pub fn new(items: Vec<KeyValue<K, V>>) -> Self {
        Self {
            items: items.into_iter().peekable(),
            on_close: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Run `hook` exactly once when the cursor is closed or dropped.
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }
}

impl<K: Send + 'static, V: Send + 'static> SnapshotIterator<K, V> {
    pub fn boxed(self) -> Box<dyn KeyValueIterator<K, V>> {
        Box::new(self)
    }
}

impl<K, V> Iterator for SnapshotIterator<K, V> {
    type Item = KeyValue<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

impl<K: Send, V: Send> KeyValueIterator<K, V> for SnapshotIterator<K, V> {
    fn peek_next_key(&mut self) -> Option<&K> {
        self.items.peek().map(|kv| &kv.key)
    }

    fn close(&mut self) {
        self.items = Vec::new().into_iter().peekable();
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

impl<K, V> Drop for SnapshotIterator<K, V> {
    fn drop(&mut self) {
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}
