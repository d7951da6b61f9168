//! Kestrel Engine - embedding facade
//!
//! Wires the execution pipeline, the in-memory domain repository and the
//! filesystem snapshotter together behind one [`Engine`] value:
//! layered configuration, startup restore, live execution, log replay and
//! checkpoints.

pub mod config;
pub mod engine;

pub use config::{EngineConfig, SnapshotConfig};
pub use engine::{Engine, EngineBuilder};
