//! Snapshot boundary
//!
//! Snapshots bound replay distance: the engine writes a full copy of
//! [`RepositoryData`] at checkpoint time and loads the newest one at startup.
//! The execution pipeline never touches these traits.
//!
//! Storage keeps at most one current generation plus the next one in flight.
//! Implementations live in `kestrel-store`.

pub use kestrel_core_types::SnapshotIdentifier;

use crate::errors::Result;
use crate::repository::RepositoryData;

/// Writes and reads full snapshots of the domain model
pub trait RepositorySnapshotter: Send {
    /// Whether a snapshot is available to load
    fn has_any(&self) -> bool;

    /// Reserve the identifier of the next snapshot
    ///
    /// # Errors
    ///
    /// Fails when the underlying storage cannot be inspected.
    fn prepare(&self) -> Result<SnapshotIdentifier>;

    /// Durably write `data` under an identifier obtained from [`prepare`](Self::prepare)
    ///
    /// # Errors
    ///
    /// Serialization or storage failures.
    fn snapshot(&self, data: &RepositoryData, identifier: &SnapshotIdentifier) -> Result<()>;

    /// Load the newest snapshot
    ///
    /// # Errors
    ///
    /// `SnapshotNotFound` when none exists, `InvalidSnapshot` when the newest
    /// one cannot be trusted.
    fn load(&self) -> Result<RepositoryData>;

    /// Drop the newest snapshot so that [`load`](Self::load) falls back to an
    /// older one. Returns false when nothing was removed.
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn discard_latest(&self) -> Result<bool> {
        Ok(false)
    }
}

/// One snapshot generation: where it lives and when it was taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    pub path: String,
    pub time: i64,
}

impl SnapshotStore {
    pub fn new(path: impl Into<String>, time: i64) -> Self {
        Self {
            path: path.into(),
            time,
        }
    }
}

/// Byte-stream handle onto one snapshot generation
pub trait SnapshotChannel {
    /// Replace the content atomically: readers see the old or the new bytes, never a mix
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read the whole content
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn read_all(&mut self) -> Result<Vec<u8>>;
}

/// Where snapshot generations live
pub trait SnapshotStorage: Send + Sync {
    /// Open a channel onto the generation at `address`
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn channel(&self, address: &str) -> Result<Box<dyn SnapshotChannel>>;

    /// Newest generation, if any
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn last_snapshot_store(&self) -> Result<Option<SnapshotStore>>;

    /// A fresh generation whose time is strictly later than the last one
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn next_snapshot_store(&self) -> Result<SnapshotStore>;

    /// The generation a snapshot taken at `time` lives in
    fn store_at(&self, time: i64) -> SnapshotStore;

    /// Delete the newest generation
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn remove_last_snapshot_store(&self) -> Result<()>;

    /// Delete every generation older than the newest, returning how many went
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn prune_superseded(&self) -> Result<usize>;
}
