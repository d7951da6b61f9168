//! Kestrel Core - transaction execution kernel
//!
//! This crate runs units of work against an in-memory domain model:
//! - Type-erased commands, transactions and events ([`payload`])
//! - Units of work and the events they buffer ([`unit`])
//! - Domain repositories with a rollback window and read-marking ([`repository`])
//! - Handler contexts, registries and id allocation
//! - The execution pipeline with snapshot-rollback or compensating failover ([`executor`])
//! - Snapshot boundary traits implemented by `kestrel-store` ([`snapshot`])

pub mod commands;
pub mod context;
pub mod errors;
pub mod executor;
pub mod failover;
pub mod ids;
pub mod logging_facility;
pub mod payload;
pub mod registry;
pub mod repository;
pub mod snapshot;
pub mod unit;

pub use kestrel_core_types as core_types;
pub use kestrel_core_types::RecordKey;

// Re-export commonly used types
pub use commands::{CommandOutput, CommandRegistry, CommandsManager};
pub use context::{CommandContext, ScratchData, TransactionContext, UnitEventBus};
pub use errors::{ExError, ExErrorKind, KestrelError, Result};
pub use executor::{TransactionExecutor, WorkflowContext};
pub use failover::{FailoverStrategy, ModelType, MutableModelFailover};
pub use ids::{IdGenerator, SequenceIdGenerator};
pub use payload::Payload;
pub use registry::TransactionRegistry;
pub use repository::{
    DomainRepository, Entity, InMemoryRepository, RecordingRepository, Repository,
    RepositoryData, RepositoryExt, WriteableRepository,
};
pub use snapshot::{
    RepositorySnapshotter, SnapshotChannel, SnapshotIdentifier, SnapshotStorage, SnapshotStore,
};
pub use unit::{EventEnvelope, EventPublisher, WorkUnit};
