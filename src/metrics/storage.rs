use super::log::{METRICS_CAPACITY, MetricsLog};
use super::model::PerformanceMetric;
use crate::Result;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const METRICS_FILE: &str = "metrics.jsonl";
// Rewrite the file once it holds this many lines
const COMPACTION_THRESHOLD: usize = METRICS_CAPACITY * 2;

/// Metrics persisted as JSON Lines, one metric per line.
pub struct MetricsStorage {
    file_path: PathBuf,
}

impl MetricsStorage {
    /// `metrics.jsonl` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new_with_path(dir.as_ref().join(METRICS_FILE))
    }

    pub fn new_with_path(path: PathBuf) -> Self {
        Self { file_path: path }
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

    /// Append one metric.
    ///
    /// The line is written under an exclusive lock, so concurrent processes
    /// never interleave partial lines. The file is compacted in the same
    /// critical section once it grows past the threshold.
    pub fn append(&self, metric: &PerformanceMetric) -> Result<()> {
        self.ensure_dir()?;
        let json = serde_json::to_string(metric)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.file_path)?;
        file.lock_exclusive()?;
        writeln!(file, "{}", json)?;

        file.seek(SeekFrom::Start(0))?;
        let lines = BufReader::new(&file).lines().count();
        if lines > COMPACTION_THRESHOLD {
            Self::compact_locked(&file)?;
        }

        Ok(())
    }

    /// Load the most recent metrics into a capped log.
    ///
    /// Compacts the file first when it has grown past the threshold.
    pub fn load(&self) -> Result<MetricsLog> {
        let mut log = MetricsLog::new();
        if !self.file_path.exists() {
            return Ok(log);
        }

        self.compact_if_needed()?;
        log.extend(self.read_all()?);
        Ok(log)
    }

    fn read_all(&self) -> Result<Vec<PerformanceMetric>> {
        let file = File::open(&self.file_path)?;
        file.lock_shared()?;
        Ok(Self::parse_lines(BufReader::new(&file)))
    }

    // Lines that fail to parse are skipped.
    fn parse_lines(reader: impl BufRead) -> Vec<PerformanceMetric> {
        reader
            .lines()
            .map_while(|l| l.ok())
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(&l).ok())
            .collect()
    }

    fn compact_if_needed(&self) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.file_path)?;
        file.lock_exclusive()?;

        let lines = BufReader::new(&file).lines().count();
        if lines <= COMPACTION_THRESHOLD {
            return Ok(());
        }
        Self::compact_locked(&file)
    }

    // Keep the newest entries; the caller holds the exclusive lock
    fn compact_locked(mut file: &File) -> Result<()> {
        file.seek(SeekFrom::Start(0))?;
        let entries = Self::parse_lines(BufReader::new(file));
        let skip = entries.len().saturating_sub(METRICS_CAPACITY);

        // Truncate in place so the lock stays valid
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        let mut writer = BufWriter::new(file);
        for entry in entries.iter().skip(skip) {
            writeln!(writer, "{}", serde_json::to_string(entry)?)?;
        }
        writer.flush()?;

        Ok(())
    }
}
