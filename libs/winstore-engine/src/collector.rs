use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use tokio::sync::mpsc;

use winstore_api::{ChangeLogRecord, Position, RecordContext, StoreContext, StoreError, StoreHandle};

/// Change-log topic of a store: `{application_id}-{store_name}-changelog`.
pub fn changelog_topic(application_id: &str, store_name: &str) -> String {
    format!("{application_id}-{store_name}-changelog")
}

/// Store context that hands change-log records to a bounded channel.
///
/// The receiving half belongs to whatever ships records to the broker.
/// `log_change` never blocks: a full or closed channel is reported as a
/// logging error.
pub struct ChangelogCollector {
    application_id: String,
    partition: i32,
    current: Mutex<Option<RecordContext>>,
    /// store name → change-log topic, filled by `register_store`.
    topics: RwLock<HashMap<String, String>>,
    tx: mpsc::Sender<ChangeLogRecord>,
}

impl std::fmt::Debug for ChangelogCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangelogCollector")
            .field("application_id", &self.application_id)
            .field("partition", &self.partition)
            .finish()
    }
}

impl ChangelogCollector {
    pub fn new(
        application_id: impl Into<String>,
        partition: i32,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<ChangeLogRecord>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let collector = Self {
            application_id: application_id.into(),
            partition,
            current: Mutex::new(None),
            topics: RwLock::new(HashMap::new()),
            tx,
        };
        (collector, rx)
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// Make `record` the record in flight.
    pub fn set_record_context(&self, record: RecordContext) {
        *self.current_guard() = Some(record);
    }

    pub fn clear_record_context(&self) {
        *self.current_guard() = None;
    }

    pub fn changelog_topic_for(&self, store_name: &str) -> Option<String> {
        self.topics_read().get(store_name).cloned()
    }

    fn current_guard(&self) -> MutexGuard<'_, Option<RecordContext>> {
        match self.current.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("record context lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn topics_read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        match self.topics.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("changelog topic map read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn topics_write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        match self.topics.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("changelog topic map write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl StoreContext for ChangelogCollector {
    fn register_store(&self, store: &StoreHandle) -> Result<(), StoreError> {
        let topic = changelog_topic(&self.application_id, &store.name);
        let mut topics = self.topics_write();
        if topics.contains_key(&store.name) {
            return Err(StoreError::usage(format!(
                "store '{}' registered twice",
                store.name
            )));
        }
        tracing::info!(store = %store.name, changelog = %topic, "registered store");
        topics.insert(store.name.clone(), topic);
        Ok(())
    }

    fn record_context(&self) -> Option<RecordContext> {
        self.current_guard().clone()
    }

    fn log_change(
        &self,
        store_name: &str,
        key: &Bytes,
        value: Option<&Bytes>,
        timestamp: i64,
        position: &Position,
    ) -> Result<(), StoreError> {
        let topic = self.changelog_topic_for(store_name).ok_or_else(|| {
            StoreError::logging(format!("store '{store_name}' has no registered change log"))
        })?;
        let record = ChangeLogRecord {
            topic,
            partition: self.partition,
            key: key.clone(),
            value: value.cloned(),
            timestamp,
            position: position.clone(),
        };
        match self.tx.try_send(record) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(record)) => {
                tracing::warn!(topic = %record.topic, "change-log buffer full, rejecting record");
                Err(StoreError::logging(format!(
                    "change-log buffer of '{}' is full",
                    record.topic
                )))
            }
            Err(mpsc::error::TrySendError::Closed(record)) => Err(StoreError::logging(format!(
                "change-log writer of '{}' is closed",
                record.topic
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use winstore_api::ErrorKind;

    use super::*;

    fn registered(buffer: usize) -> (ChangelogCollector, mpsc::Receiver<ChangeLogRecord>) {
        let (collector, rx) = ChangelogCollector::new("app", 3, buffer);
        collector
            .register_store(&StoreHandle::new("counts", false))
            .unwrap();
        (collector, rx)
    }

    #[test]
    fn should_name_changelog_topic_after_application_and_store() {
        assert_eq!(changelog_topic("app", "counts"), "app-counts-changelog");
    }

    #[test]
    fn should_forward_records_to_channel() {
        // given
        let (collector, mut rx) = registered(8);
        let position = Position::empty().with_component("input", 3, 11);

        // when
        collector
            .log_change("counts", &Bytes::from_static(b"key"), Some(&Bytes::from_static(b"v")), 5, &position)
            .unwrap();

        // then
        let record = rx.try_recv().unwrap();
        assert_eq!(
            record,
            ChangeLogRecord {
                topic: "app-counts-changelog".to_string(),
                partition: 3,
                key: Bytes::from_static(b"key"),
                value: Some(Bytes::from_static(b"v")),
                timestamp: 5,
                position,
            }
        );
    }

    #[test]
    fn should_reject_unregistered_store() {
        let (collector, _rx) = ChangelogCollector::new("app", 0, 8);

        let err = collector
            .log_change("unknown", &Bytes::new(), None, 0, &Position::empty())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Logging);
    }

    #[test]
    fn should_reject_duplicate_registration() {
        let (collector, _rx) = registered(8);

        let err = collector
            .register_store(&StoreHandle::new("counts", false))
            .unwrap_err();

        assert!(err.is_fatal());
    }

    #[test]
    fn should_fail_without_blocking_when_buffer_is_full() {
        // given
        let (collector, _rx) = registered(1);
        collector
            .log_change("counts", &Bytes::new(), None, 0, &Position::empty())
            .unwrap();

        // when
        let err = collector
            .log_change("counts", &Bytes::new(), None, 1, &Position::empty())
            .unwrap_err();

        // then
        assert_eq!(err.kind(), ErrorKind::Logging);
    }

    #[test]
    fn should_fail_when_writer_is_gone() {
        let (collector, rx) = registered(4);
        drop(rx);

        let err = collector
            .log_change("counts", &Bytes::new(), None, 0, &Position::empty())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Logging);
    }

    #[test]
    fn should_expose_record_in_flight() {
        // given
        let (collector, _rx) = registered(4);
        assert_eq!(collector.record_context(), None);

        // when
        collector.set_record_context(RecordContext::new(10, 4, 3, "input"));
        let in_flight = collector.record_context();
        collector.clear_record_context();

        // then
        assert_eq!(in_flight, Some(RecordContext::new(10, 4, 3, "input")));
        assert_eq!(collector.record_context(), None);
    }

    #[tokio::test]
    async fn should_deliver_records_to_async_writer_in_order() {
        // given
        let (collector, mut rx) = registered(16);
        let writer = tokio::spawn(async move {
            let mut timestamps = Vec::new();
            while let Some(record) = rx.recv().await {
                timestamps.push(record.timestamp);
            }
            timestamps
        });

        // when
        for ts in 0..5 {
            collector
                .log_change("counts", &Bytes::new(), None, ts, &Position::empty())
                .unwrap();
        }
        drop(collector);

        // then
        assert_eq!(writer.await.unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
