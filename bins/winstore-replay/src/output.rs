use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use winstore_api::{ChangeLogRecord, KeyValue, Position, WindowedKey};
use winstore_engine::key_schema::StoreKey;

use crate::error::ReplayError;

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(text: &str) -> Result<Vec<u8>, ReplayError> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| ReplayError::Decode(format!("invalid base64: {e}")))
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn store_key(decoded: &StoreKey) -> Value {
    json!({
        "raw_key": text(&decoded.key),
        "window_start": decoded.window_start,
        "sequence": decoded.sequence,
    })
}

pub fn changelog_record(record: &ChangeLogRecord, decoded: &StoreKey) -> Result<Value, ReplayError> {
    Ok(json!({
        "type": "changelog",
        "topic": record.topic,
        "partition": record.partition,
        "key": encode(&record.key),
        "decoded": store_key(decoded),
        "value": record.value.as_ref().map(|v| text(v)),
        "timestamp": record.timestamp,
        "position": serde_json::to_value(&record.position)?,
    }))
}

pub fn window_values(rows: Vec<KeyValue<i64, bytes::Bytes>>) -> Value {
    let rows: Vec<Value> = rows
        .into_iter()
        .map(|kv| json!({ "window_start": kv.key, "value": text(&kv.value) }))
        .collect();
    json!({ "type": "fetch", "rows": rows })
}

pub fn windowed_values(rows: Vec<KeyValue<WindowedKey, bytes::Bytes>>) -> Value {
    let rows: Vec<Value> = rows
        .into_iter()
        .map(|kv| {
            json!({
                "key": text(&kv.key.key),
                "window_start": kv.key.window.start,
                "window_end": kv.key.window.end,
                "value": text(&kv.value),
            })
        })
        .collect();
    json!({ "type": "fetch", "rows": rows })
}

pub fn single_value(value: Option<&[u8]>) -> Value {
    json!({ "type": "get", "value": value.map(text) })
}

pub fn position(position: &Position) -> Result<Value, ReplayError> {
    Ok(json!({ "type": "position", "position": serde_json::to_value(position)? }))
}
