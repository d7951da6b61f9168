//! JSON repository snapshotter
//!
//! A snapshot file holds an envelope with the identifier, the time it was
//! taken, a digest of the data and the data itself. Loading recomputes the
//! digest and refuses a snapshot whose content does not match.

use std::path::Path;

use chrono::{DateTime, Utc};
use kestrel_core::errors::KestrelError;
use kestrel_core::{
    RepositoryData, RepositorySnapshotter, Result, SnapshotIdentifier, SnapshotStorage,
};
use serde::{Deserialize, Serialize};

use crate::digest::compute_data_digest;
use crate::errors::invalid_snapshot;
use crate::storage::FileSnapshotStorage;

/// Identifier kind written by [`JsonSnapshotter`]
pub const JSON_SNAPSHOT_KIND: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    kind: u8,
    time: i64,
    taken_at: DateTime<Utc>,
    digest: String,
    data: RepositoryData,
}

/// Snapshotter writing JSON envelopes through a [`SnapshotStorage`]
#[derive(Debug)]
pub struct JsonSnapshotter<S = FileSnapshotStorage> {
    storage: S,
}

impl<S: SnapshotStorage> JsonSnapshotter<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl JsonSnapshotter<FileSnapshotStorage> {
    /// Snapshotter over files in `dir`
    pub fn in_dir(dir: impl Into<std::path::PathBuf>) -> Self {
        Self::new(FileSnapshotStorage::new(dir))
    }
}

impl<S: SnapshotStorage> RepositorySnapshotter for JsonSnapshotter<S> {
    fn has_any(&self) -> bool {
        match self.storage.last_snapshot_store() {
            Ok(last) => last.is_some(),
            Err(err) => {
                tracing::warn!(error = %err, "Could not inspect snapshot storage");
                false
            }
        }
    }

    fn prepare(&self) -> Result<SnapshotIdentifier> {
        let store = self.storage.next_snapshot_store()?;
        Ok(SnapshotIdentifier::new(JSON_SNAPSHOT_KIND, store.time))
    }

    fn snapshot(&self, data: &RepositoryData, identifier: &SnapshotIdentifier) -> Result<()> {
        let store = self.storage.store_at(identifier.time);
        let envelope = SnapshotEnvelope {
            kind: identifier.kind,
            time: identifier.time,
            taken_at: Utc::now(),
            digest: compute_data_digest(data)?,
            data: data.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        self.storage.channel(&store.path)?.write_all(&bytes)?;

        tracing::debug!(
            path = %store.path,
            time = store.time,
            records = data.len() as u64,
            digest = %envelope.digest,
            "Wrote snapshot"
        );

        self.storage.prune_superseded()?;
        Ok(())
    }

    fn load(&self) -> Result<RepositoryData> {
        let store = self
            .storage
            .last_snapshot_store()?
            .ok_or(KestrelError::SnapshotNotFound)?;
        let path = Path::new(&store.path);
        let bytes = self.storage.channel(&store.path)?.read_all()?;

        let envelope: SnapshotEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| invalid_snapshot(path, format!("unreadable envelope: {}", e)))?;
        if envelope.kind != JSON_SNAPSHOT_KIND {
            return Err(invalid_snapshot(
                path,
                format!("unsupported snapshot kind {}", envelope.kind),
            ));
        }
        let digest = compute_data_digest(&envelope.data)?;
        if digest != envelope.digest {
            return Err(invalid_snapshot(
                path,
                format!("digest mismatch: expected {}, got {}", envelope.digest, digest),
            ));
        }

        tracing::debug!(
            path = %store.path,
            time = store.time,
            records = envelope.data.len() as u64,
            "Loaded snapshot"
        );
        Ok(envelope.data)
    }

    fn discard_latest(&self) -> Result<bool> {
        let existed = self.storage.last_snapshot_store()?.is_some();
        self.storage.remove_last_snapshot_store()?;
        Ok(existed)
    }
}
