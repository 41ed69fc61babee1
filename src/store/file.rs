use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use super::{Record, RecordStore};
use crate::{ApiChainError, Result};

/// A JSON object `{ name: record, ... }` stored in one file.
///
/// # Concurrency
/// Reads take a shared `fs2` lock and writes take an exclusive lock for the
/// whole read-modify-write cycle, so two processes never interleave bytes in
/// the file. Two writers that both changed a record still resolve as
/// last-write-wins.
pub struct JsonFileStore<T> {
    file_path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> JsonFileStore<T> {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            _record: PhantomData,
        }
    }

    /// Store named `file_name` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self::new(dir.as_ref().join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, T>> {
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(content).map_err(|e| {
            ApiChainError::ParseError(format!(
                "corrupted store file {}: {}",
                self.file_path.display(),
                e
            ))
        })
    }

    fn read_all(&self) -> Result<BTreeMap<String, T>> {
        if !self.file_path.exists() {
            return Ok(BTreeMap::new());
        }

        let mut file = File::open(&self.file_path)?;
        file.lock_shared()?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        // Unlock on drop
        self.parse(&content)
    }

    /// Run `change` on the current contents under an exclusive lock and write
    /// the result back.
    fn modify<R>(&self, change: impl FnOnce(&mut BTreeMap<String, T>) -> R) -> Result<R> {
        self.ensure_dir()?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.file_path)?;
        file.lock_exclusive()?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;
        let mut records = self.parse(&content)?;

        let outcome = change(&mut records);

        let json = serde_json::to_string_pretty(&records)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;

        Ok(outcome)
    }
}

impl<T: Record> RecordStore<T> for JsonFileStore<T> {
    fn get(&self, name: &str) -> Result<Option<T>> {
        Ok(self.read_all()?.remove(name))
    }

    fn list(&self) -> Result<Vec<T>> {
        Ok(self.read_all()?.into_values().collect())
    }

    fn put(&self, record: T) -> Result<()> {
        let name = record.key().to_string();
        debug!(store = %self.file_path.display(), %name, "saving record");
        self.modify(|records| {
            records.insert(name, record);
        })
    }

    fn delete(&self, name: &str) -> Result<bool> {
        if !self.file_path.exists() {
            return Ok(false);
        }
        self.modify(|records| records.remove(name).is_some())
    }
}
