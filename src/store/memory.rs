use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use super::{Record, RecordStore};
use crate::Result;

/// Process-local store, for tests and embedding.
pub struct MemoryStore<T> {
    records: RwLock<BTreeMap<String, T>>,
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_records(records: impl IntoIterator<Item = T>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write().unwrap_or_else(PoisonError::into_inner);
            for record in records {
                map.insert(record.key().to_string(), record);
            }
        }
        store
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> RecordStore<T> for MemoryStore<T> {
    fn get(&self, name: &str) -> Result<Option<T>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(name).cloned())
    }

    fn list(&self) -> Result<Vec<T>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.values().cloned().collect())
    }

    fn put(&self, record: T) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.key().to_string(), record);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        Ok(records.remove(name).is_some())
    }
}
