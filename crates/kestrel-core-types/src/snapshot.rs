//! Snapshot identifiers

use serde::{Deserialize, Serialize};

/// Pointer under which a snapshot is written
///
/// Produced by a snapshotter's `prepare()` and handed back to its
/// `snapshot()`. `kind` tags the snapshotter that produced it and `time` is
/// the generation timestamp (milliseconds since the Unix epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotIdentifier {
    pub kind: u8,
    pub time: i64,
}

impl SnapshotIdentifier {
    pub fn new(kind: u8, time: i64) -> Self {
        Self { kind, time }
    }
}
