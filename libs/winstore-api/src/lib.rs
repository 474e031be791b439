pub mod context;
pub mod error;
pub mod iter;
pub mod position;
pub mod record;
pub mod store;
pub mod window;

pub use context::{RecordContext, StoreContext};
pub use error::{ErrorKind, StoreError};
pub use iter::{KeyValueIterator, SnapshotIterator, WindowStoreIterator, WindowedIterator};
pub use position::Position;
pub use record::ChangeLogRecord;
pub use store::{StoreHandle, WindowStore};
pub use window::{KeyValue, TimeWindow, WindowedKey};
