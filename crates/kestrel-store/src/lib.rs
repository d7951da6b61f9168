//! Kestrel Store - Filesystem snapshots for the Kestrel engine
//!
//! Provides:
//! - Snapshot generations stored as files with atomic temp→rename writes
//! - JSON snapshotter with SHA256 integrity digests

pub mod atomic;
pub mod digest;
pub mod errors;
pub mod snapshotter;
pub mod storage;

// Re-export key types
pub use snapshotter::JsonSnapshotter;
pub use storage::FileSnapshotStorage;
