//! Key-value backend and lazy data-loader contracts.

mod kv;

pub use kv::{DataLoader, InMemoryKeyValueStore, KvDataLoader, KvError, KeyValueDataSource};
