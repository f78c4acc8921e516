pub mod kv_store;

pub use kv_store::{KeyValueStore, SqliteKeyValueStore, HOUSEHOLDS_KEY, SYNC_STATUS_KEY};
