//! Named-record persistence.
//!
//! The chain engine only sees [`RecordStore`]; the CLI backs it with JSON files
//! and tests with the in-memory store.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Result;

/// A record addressed by a unique name.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    fn key(&self) -> &str;
}

pub trait RecordStore<T: Record>: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<T>>;

    /// All records, ordered by name.
    fn list(&self) -> Result<Vec<T>>;

    /// Insert or replace the record under its name.
    fn put(&self, record: T) -> Result<()>;

    /// Returns whether a record was removed.
    fn delete(&self, name: &str) -> Result<bool>;
}
