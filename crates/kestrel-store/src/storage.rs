//! Filesystem snapshot storage
//!
//! Each generation is one file `snapshot-<time>.json` in the storage
//! directory, `<time>` being milliseconds since the Unix epoch. The newest
//! generation is the one with the greatest time.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use kestrel_core::{Result, SnapshotChannel, SnapshotStorage, SnapshotStore};

use crate::atomic::atomic_write;
use crate::errors::io_error;

const PREFIX: &str = "snapshot-";
const EXTENSION: &str = ".json";

/// Snapshot generations kept as files in one directory
#[derive(Debug, Clone)]
pub struct FileSnapshotStorage {
    dir: PathBuf,
}

impl FileSnapshotStorage {
    /// Storage rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All generations, oldest first
    ///
    /// # Errors
    ///
    /// IO failures listing the directory.
    pub fn generations(&self) -> Result<Vec<SnapshotStore>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut generations = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| io_error("list_snapshots", e))? {
            let entry = entry.map_err(|e| io_error("list_snapshots", e))?;
            let name = entry.file_name();
            if let Some(time) = name.to_str().and_then(parse_time) {
                generations.push(SnapshotStore::new(
                    entry.path().display().to_string(),
                    time,
                ));
            }
        }
        generations.sort_by_key(|store| store.time);
        Ok(generations)
    }
}

fn parse_time(file_name: &str) -> Option<i64> {
    file_name
        .strip_prefix(PREFIX)?
        .strip_suffix(EXTENSION)?
        .parse()
        .ok()
}

impl SnapshotStorage for FileSnapshotStorage {
    fn channel(&self, address: &str) -> Result<Box<dyn SnapshotChannel>> {
        Ok(Box::new(FileChannel {
            path: PathBuf::from(address),
        }))
    }

    fn last_snapshot_store(&self) -> Result<Option<SnapshotStore>> {
        Ok(self.generations()?.pop())
    }

    fn next_snapshot_store(&self) -> Result<SnapshotStore> {
        let now = Utc::now().timestamp_millis();
        let time = match self.last_snapshot_store()? {
            Some(last) if last.time >= now => last.time + 1,
            _ => now,
        };
        Ok(self.store_at(time))
    }

    fn store_at(&self, time: i64) -> SnapshotStore {
        let path = self.dir.join(format!("{}{}{}", PREFIX, time, EXTENSION));
        SnapshotStore::new(path.display().to_string(), time)
    }

    fn remove_last_snapshot_store(&self) -> Result<()> {
        if let Some(last) = self.last_snapshot_store()? {
            fs::remove_file(&last.path).map_err(|e| io_error("remove_snapshot", e))?;
            tracing::debug!(path = %last.path, time = last.time, "Removed snapshot generation");
        }
        Ok(())
    }

    fn prune_superseded(&self) -> Result<usize> {
        let mut generations = self.generations()?;
        generations.pop();
        for superseded in &generations {
            fs::remove_file(&superseded.path).map_err(|e| io_error("prune_snapshot", e))?;
        }
        if !generations.is_empty() {
            tracing::debug!(
                pruned = generations.len() as u64,
                "Pruned superseded snapshot generations"
            );
        }
        Ok(generations.len())
    }
}

/// Channel onto one snapshot file
struct FileChannel {
    path: PathBuf,
}

impl SnapshotChannel for FileChannel {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        atomic_write(&self.path, bytes)
    }

    fn read_all(&mut self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| io_error("read_snapshot", e))
    }
}
