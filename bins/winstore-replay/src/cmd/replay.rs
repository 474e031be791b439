use std::io::{BufRead, BufReader};
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use winstore_api::{ChangeLogRecord, ErrorKind, KeyValue, RecordContext, StoreError, StoreHandle, WindowStore};
use winstore_engine::{ChangeLoggingWindowStore, ChangelogCollector, WindowStoreConfig, key_schema};
use winstore_storage_memory::{InMemoryWindowStore, MemoryWindowStoreConfig};

use crate::config::{Op, ReplayArgs};
use crate::error::ReplayError;
use crate::output;

type ReplayStore = ChangeLoggingWindowStore<InMemoryWindowStore>;

pub async fn run(args: ReplayArgs) -> Result<(), ReplayError> {
    tracing::info!("winstore-replay starting");

    // --- Load config ---
    let config = WindowStoreConfig::load(&args.config)?;
    tracing::info!(config = %args.config, store = %config.name, "loaded config");

    let mut replayer = Replayer::open(&config)?;

    // --- Apply script ---
    let reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        Box::new(BufReader::new(std::fs::File::open(&args.input)?))
    };

    let mut applied = 0usize;
    let mut lost = 0usize;
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let op: Op = serde_json::from_str(line).map_err(|e| ReplayError::Input {
            line: line_no,
            detail: e.to_string(),
        })?;

        let mut out = Vec::new();
        let result = replayer.step(op, &mut out);
        print_lines(&out);
        match result {
            Ok(()) => applied += 1,
            Err(e) if e.kind() == ErrorKind::Logging => {
                tracing::warn!(line = line_no, error = %e, "change-log record lost");
                lost += 1;
            }
            Err(e) => return Err(ReplayError::Op { line: line_no, source: e }),
        }
    }

    // --- Shutdown ---
    let mut out = Vec::new();
    let shipped = replayer.finish(&mut out).await?;
    print_lines(&out);

    tracing::info!(applied, shipped, lost, "replay finished");
    if lost > 0 {
        return Err(ReplayError::ChangelogLost { failed: lost });
    }
    Ok(())
}

fn print_lines(lines: &[Value]) {
    for line in lines {
        println!("{line}");
    }
}

/// Change-logged memory store wired to a collector whose records are read
/// back on the same thread, so output follows the order of operations.
struct Replayer {
    store: ReplayStore,
    collector: Arc<ChangelogCollector>,
    rx: mpsc::Receiver<ChangeLogRecord>,
    shipped: usize,
}

impl Replayer {
    fn open(config: &WindowStoreConfig) -> Result<Self, ReplayError> {
        let (collector, rx) = ChangelogCollector::new(
            config.application_id.clone(),
            config.partition,
            config.changelog_buffer,
        );
        let collector = Arc::new(collector);

        let inner = InMemoryWindowStore::new(
            MemoryWindowStoreConfig::new(config.name.clone())
                .with_window_size(config.window_size_ms)
                .with_retention(config.retention_ms)
                .with_retain_duplicates(config.retain_duplicates),
        )?;
        let mut store = config.decorate(inner);
        let root = StoreHandle::new(config.name.clone(), store.persistent());
        store.init(collector.clone(), &root)?;

        Ok(Self {
            store,
            collector,
            rx,
            shipped: 0,
        })
    }

    /// Apply `op` and append its output to `out`: the change-log records it
    /// produced first, then its own result line. Records are appended even
    /// when the op fails.
    fn step(&mut self, op: Op, out: &mut Vec<Value>) -> Result<(), StoreError> {
        let result = apply(&mut self.store, &self.collector, op);
        self.drain(out);
        if let Some(line) = result? {
            out.push(line);
        }
        Ok(())
    }

    fn drain(&mut self, out: &mut Vec<Value>) {
        while let Ok(record) = self.rx.try_recv() {
            if let Some(line) = render(&record) {
                out.push(line);
                self.shipped += 1;
            }
        }
    }

    /// Close the store and wait for the change-log channel to run dry.
    async fn finish(self, out: &mut Vec<Value>) -> Result<usize, ReplayError> {
        let Self {
            mut store,
            collector,
            mut rx,
            mut shipped,
        } = self;
        store.flush()?;
        store.close()?;
        drop(store);
        drop(collector);
        while let Some(record) = rx.recv().await {
            if let Some(line) = render(&record) {
                out.push(line);
                shipped += 1;
            }
        }
        Ok(shipped)
    }
}

fn render(record: &ChangeLogRecord) -> Option<Value> {
    let line = key_schema::decode(&record.key)
        .map_err(ReplayError::from)
        .and_then(|decoded| output::changelog_record(record, &decoded));
    match line {
        Ok(line) => Some(line),
        Err(e) => {
            tracing::error!(topic = %record.topic, error = %e, "unprintable change-log record");
            None
        }
    }
}

fn apply(
    store: &mut ReplayStore,
    collector: &ChangelogCollector,
    op: Op,
) -> Result<Option<Value>, StoreError> {
    let line = match op {
        Op::Record {
            topic,
            partition,
            offset,
            timestamp,
        } => {
            collector.set_record_context(RecordContext::new(timestamp, offset, partition, topic));
            None
        }
        Op::Put {
            key,
            value,
            window_start,
            timestamp,
        } => {
            write(store, key, Some(Bytes::from(value)), window_start, timestamp)?;
            None
        }
        Op::Delete {
            key,
            window_start,
            timestamp,
        } => {
            write(store, key, None, window_start, timestamp)?;
            None
        }
        Op::Get { key, window_start } => {
            let value = store.fetch_one(&Bytes::from(key), window_start)?;
            Some(output::single_value(value.as_deref()))
        }
        Op::Fetch {
            key,
            from,
            to,
            backward,
        } => {
            let key = Bytes::from(key);
            let it = if backward {
                store.backward_fetch(&key, from, to)?
            } else {
                store.fetch(&key, from, to)?
            };
            let rows: Vec<KeyValue<i64, Bytes>> = it.collect();
            Some(output::window_values(rows))
        }
        Op::FetchRange {
            key_from,
            key_to,
            from,
            to,
            backward,
        } => {
            let key_from = key_from.map(Bytes::from);
            let key_to = key_to.map(Bytes::from);
            let it = if backward {
                store.backward_fetch_range(key_from.as_ref(), key_to.as_ref(), from, to)?
            } else {
                store.fetch_range(key_from.as_ref(), key_to.as_ref(), from, to)?
            };
            Some(output::windowed_values(it.collect()))
        }
        Op::FetchAll { from, to, backward } => {
            let it = if backward {
                store.backward_fetch_all(from, to)?
            } else {
                store.fetch_all(from, to)?
            };
            Some(output::windowed_values(it.collect()))
        }
        Op::Position => {
            let line = output::position(&store.position()?)
                .map_err(|e| StoreError::store(e.to_string()))?;
            Some(line)
        }
        Op::Flush => {
            store.flush()?;
            None
        }
    };
    Ok(line)
}

fn write(
    store: &mut ReplayStore,
    key: String,
    value: Option<Bytes>,
    window_start: i64,
    timestamp: Option<i64>,
) -> Result<(), StoreError> {
    let key = Bytes::from(key);
    match timestamp {
        Some(ts) => store.put_with_timestamp(&key, value, window_start, ts),
        None => store.put(&key, value, window_start),
    }
}
