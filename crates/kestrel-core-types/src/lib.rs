//! Core types shared across Kestrel crates
//!
//! This crate provides the small value types every other crate agrees on:
//!
//! - **Record keys**: `RecordKey`, the identity of one stored entity
//! - **Snapshot identifiers**: `SnapshotIdentifier`, the pointer a snapshot is written under
//! - **Schema constants**: Canonical field keys and event names for structured logging

pub mod record;
pub mod schema;
pub mod snapshot;

pub use record::RecordKey;
pub use snapshot::SnapshotIdentifier;
