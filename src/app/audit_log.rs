//! Audit log of a scan.
//!
//! Every counted resource type produces one `account,region,resourceType,count` record; free-form
//! notes (skipped accounts, permission hints, counter errors) are written as single-field
//! records into the same file. Records are flushed as they are written so an interrupted scan
//! still leaves everything counted so far on disk.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait ScanLog: Send + Sync {
    fn log_record(&self, record: &[String]) -> Result<()>;

    fn log_message(&self, message: &str) -> Result<()> {
        self.log_record(&[message.to_string()])
    }

    fn close(&self) -> Result<()>;
}

/// CSV file sink
pub struct CsvScanLog {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
}

impl CsvScanLog {
    /// Create (or truncate) the audit log at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("Failed to create audit log {}", path.display()))?;
        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScanLog for CsvScanLog {
    fn log_record(&self, record: &[String]) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("audit log lock poisoned"))?;
        writer
            .write_record(record)
            .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("audit log lock poisoned"))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.path.display()))
    }
}

/// In-memory sink
#[derive(Debug, Default)]
pub struct MemoryScanLog {
    entries: Mutex<Vec<Vec<String>>>,
}

impl MemoryScanLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Vec<String>> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Four-field resource records
    pub fn records(&self) -> Vec<Vec<String>> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.len() == 4)
            .collect()
    }

    /// Single-field notes
    pub fn messages(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.len() == 1)
            .map(|mut entry| entry.remove(0))
            .collect()
    }
}

impl ScanLog for MemoryScanLog {
    fn log_record(&self, record: &[String]) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("audit log lock poisoned"))?
            .push(record.to_vec());
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
