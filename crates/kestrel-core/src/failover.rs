//! Failure-recovery strategy selection

use serde::{Deserialize, Serialize};

use crate::repository::DomainRepository;

/// Whether the domain model is mutated in place
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Immutable,
    Mutable,
}

/// How a mutable model recovers from a failed unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutableModelFailover {
    #[default]
    Snapshots,
    CompensatingActions,
}

/// Recovery mode of the execution pipeline, fixed at construction
///
/// The pipeline consults it at exactly three points: before the first
/// command (`begin`), after the last transaction (`commit`) and on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverStrategy {
    /// `begin`/`commit`/`rollback` on the domain repository
    SnapshotRollback,
    /// Run compensating handlers in reverse order of application
    Compensation,
}

impl FailoverStrategy {
    pub fn from_config(model_type: ModelType, failover: MutableModelFailover) -> Self {
        match (model_type, failover) {
            (ModelType::Mutable, MutableModelFailover::Snapshots) => {
                FailoverStrategy::SnapshotRollback
            }
            _ => FailoverStrategy::Compensation,
        }
    }

    pub fn is_snapshot_rollback(self) -> bool {
        self == FailoverStrategy::SnapshotRollback
    }

    pub(crate) fn begin(self, repository: &mut dyn DomainRepository) {
        if self.is_snapshot_rollback() {
            repository.begin();
        }
    }

    pub(crate) fn commit(self, repository: &mut dyn DomainRepository) {
        if self.is_snapshot_rollback() {
            repository.commit();
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailoverStrategy::SnapshotRollback => "snapshot_rollback",
            FailoverStrategy::Compensation => "compensation",
        }
    }
}

impl std::fmt::Display for FailoverStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
