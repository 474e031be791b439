use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser)]
#[command(
    name = "winstore-replay",
    about = "Replay writes through a change-logged window store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a JSON-lines script of operations and print change-log records
    Replay(ReplayArgs),
    /// Decode a base64 store key
    Decode(DecodeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Path to the TOML store config
    #[arg(long, default_value = "winstore.toml", env = "WINSTORE_CONFIG")]
    pub config: String,

    /// Operations file, one JSON object per line; `-` reads stdin
    #[arg(long, default_value = "-")]
    pub input: String,
}

#[derive(Args, Clone, Debug)]
pub struct DecodeArgs {
    /// Store key, base64 encoded
    pub key: String,

    /// Window size in ms; prints the window end when given
    #[arg(long)]
    pub window_size_ms: Option<i64>,
}

// ---- Replay script ----

/// One line of a replay script. Keys and values are UTF-8 text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Switch the record in flight.
    Record {
        topic: String,
        #[serde(default)]
        partition: i32,
        offset: i64,
        timestamp: i64,
    },
    Put {
        key: String,
        value: String,
        window_start: i64,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Delete {
        key: String,
        window_start: i64,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Get {
        key: String,
        window_start: i64,
    },
    Fetch {
        key: String,
        from: i64,
        to: i64,
        #[serde(default)]
        backward: bool,
    },
    FetchRange {
        #[serde(default)]
        key_from: Option<String>,
        #[serde(default)]
        key_to: Option<String>,
        from: i64,
        to: i64,
        #[serde(default)]
        backward: bool,
    },
    FetchAll {
        from: i64,
        to: i64,
        #[serde(default)]
        backward: bool,
    },
    Position,
    Flush,
}
