use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use winstore_api::{
    ChangeLogRecord, ErrorKind, KeyValueIterator, Position, RecordContext, StoreHandle, WindowStore,
};
use winstore_engine::{ChangeLoggingWindowStore, ChangelogCollector, WindowStoreConfig, key_schema};
use winstore_storage_memory::{InMemoryWindowStore, MemoryWindowStoreConfig};

struct Harness {
    store: ChangeLoggingWindowStore<InMemoryWindowStore>,
    collector: Arc<ChangelogCollector>,
    rx: mpsc::Receiver<ChangeLogRecord>,
}

impl Harness {
    fn open(toml: &str) -> Self {
        let config = WindowStoreConfig::parse(toml).unwrap();
        let (collector, rx) =
            ChangelogCollector::new(config.application_id.clone(), config.partition, config.changelog_buffer);
        let collector = Arc::new(collector);
        let inner = InMemoryWindowStore::new(
            MemoryWindowStoreConfig::new(config.name.clone())
                .with_window_size(config.window_size_ms)
                .with_retention(config.retention_ms)
                .with_retain_duplicates(config.retain_duplicates),
        )
        .unwrap();
        let mut store = config.decorate(inner);
        store
            .init(collector.clone(), &StoreHandle::new(config.name.clone(), false))
            .unwrap();
        Self { store, collector, rx }
    }

    fn records(&mut self) -> Vec<ChangeLogRecord> {
        let mut out = Vec::new();
        while let Ok(record) = self.rx.try_recv() {
            out.push(record);
        }
        out
    }
}

const OVERWRITING: &str = r#"
name = "counts"
application_id = "app"
partition = 2
window_size_ms = 10
retention_ms = 1000
"#;

const RETAINING: &str = r#"
name = "joins"
application_id = "app"
retain_duplicates = true
window_size_ms = 10
retention_ms = 1000
"#;

fn b(s: &'static str) -> Bytes {
    Bytes::from_static(s.as_bytes())
}

#[test]
fn should_log_store_key_with_position_of_applied_write() {
    // given
    let mut h = Harness::open(OVERWRITING);
    h.collector
        .set_record_context(RecordContext::new(42, 7, 0, "input"));

    // when
    h.store.put(&b("k"), Some(b("v")), 0).unwrap();

    // then
    let records = h.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.topic, "app-counts-changelog");
    assert_eq!(record.partition, 2);
    assert_eq!(record.key, key_schema::to_store_key_binary(b"k", 0, 0));
    assert_eq!(record.value, Some(b("v")));
    assert_eq!(record.timestamp, 42);
    assert_eq!(record.position, Position::empty().with_component("input", 0, 7));
    assert_eq!(h.store.fetch_one(&b("k"), 0).unwrap(), Some(b("v")));
}

#[test]
fn should_log_tombstone_for_delete() {
    // given
    let mut h = Harness::open(OVERWRITING);
    h.store.put(&b("k"), Some(b("v")), 0).unwrap();

    // when
    h.store.put(&b("k"), None, 0).unwrap();

    // then
    let records = h.records();
    assert_eq!(records.len(), 2);
    assert!(records[1].is_tombstone());
    assert_eq!(records[1].key, records[0].key);
    assert_eq!(h.store.fetch_one(&b("k"), 0).unwrap(), None);
}

#[test]
fn should_log_distinct_sequences_when_retaining_duplicates() {
    // given
    let mut h = Harness::open(RETAINING);

    // when
    h.store.put(&b("k"), Some(b("v")), 0).unwrap();
    h.store.put(&b("k"), Some(b("v")), 0).unwrap();

    // then
    let keys: Vec<Bytes> = h.records().into_iter().map(|r| r.key).collect();
    assert_eq!(
        keys,
        vec![
            key_schema::to_store_key_binary(b"k", 0, 1),
            key_schema::to_store_key_binary(b"k", 0, 2),
        ]
    );
    let values: Vec<Bytes> = h.store.fetch(&b("k"), 0, 0).unwrap().map(|kv| kv.value).collect();
    assert_eq!(values, vec![b("v"), b("v")]);
}

#[test]
fn should_carry_merged_position_across_partitions() {
    // given
    let mut h = Harness::open(OVERWRITING);

    // when
    h.collector
        .set_record_context(RecordContext::new(1, 3, 0, "input"));
    h.store.put(&b("a"), Some(b("1")), 0).unwrap();
    h.collector
        .set_record_context(RecordContext::new(2, 9, 1, "input"));
    h.store.put(&b("b"), Some(b("2")), 10).unwrap();

    // then
    let records = h.records();
    let expected = Position::empty()
        .with_component("input", 0, 3)
        .with_component("input", 1, 9);
    assert_eq!(records[1].position, expected);
    assert!(records[1].position.dominates(&records[0].position));
    assert_eq!(h.store.position().unwrap(), expected);
}

#[test]
fn should_release_iterators_through_the_decorator() {
    // given
    let mut h = Harness::open(OVERWRITING);
    h.store.put(&b("a"), Some(b("1")), 0).unwrap();

    // when
    let mut empty = h.store.fetch(&b("missing"), 0, 100).unwrap();
    assert!(empty.next().is_none());
    empty.close();
    {
        let mut partial = h.store.fetch_all(0, 100).unwrap();
        assert_eq!(partial.peek_next_key().map(|k| k.window.start), Some(0));
    }

    // then
    assert_eq!(h.store.inner().open_iterator_count(), 0);
}

#[test]
fn should_keep_local_write_when_change_log_is_full() {
    // given
    let mut h = Harness::open(&format!("{OVERWRITING}changelog_buffer = 1\n"));
    h.store.put(&b("a"), Some(b("1")), 0).unwrap();

    // when
    let err = h.store.put(&b("b"), Some(b("2")), 0).unwrap_err();

    // then
    assert_eq!(err.kind(), ErrorKind::Logging);
    assert_eq!(h.store.fetch_one(&b("b"), 0).unwrap(), Some(b("2")));
    assert_eq!(h.records().len(), 1);
}

#[test]
fn should_reject_writes_after_close() {
    // given
    let mut h = Harness::open(OVERWRITING);

    // when
    h.store.close().unwrap();

    // then
    let err = h.store.put(&b("a"), Some(b("1")), 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert!(h.records().is_empty());
}

#[tokio::test]
async fn should_deliver_records_to_async_consumer() {
    // given
    let Harness {
        mut store,
        collector,
        mut rx,
    } = Harness::open(OVERWRITING);
    let consumer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(record) = rx.recv().await {
            seen.push(key_schema::decode(&record.key).unwrap().window_start);
        }
        seen
    });

    // when
    for start in [0, 10, 20] {
        store.put(&b("k"), Some(b("v")), start).unwrap();
        tokio::task::yield_now().await;
    }
    store.close().unwrap();
    drop(store);
    drop(collector);

    // then
    assert_eq!(consumer.await.unwrap(), vec![0, 10, 20]);
}
