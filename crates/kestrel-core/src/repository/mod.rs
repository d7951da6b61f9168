//! Domain repository abstractions
//!
//! Records are stored as `serde_json::Value` under a [`RecordKey`]. The
//! object-safe traits below work on raw values so that the executor can wrap
//! any repository behind `dyn`; typed access for handler code lives in
//! [`RepositoryExt`].
//!
//! ## Traits
//!
//! - [`Repository`]: read access (the view command handlers get)
//! - [`WriteableRepository`]: read-write access (the view transaction handlers get)
//! - [`DomainRepository`]: the full store, including the transactional window
//!   used by snapshot-rollback failover and import/export for snapshots

pub mod memory;
pub mod recording;

use std::collections::BTreeMap;

use kestrel_core_types::RecordKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{KestrelError, Result};

pub use memory::InMemoryRepository;
pub use recording::RecordingRepository;

/// A domain entity stored in a repository
pub trait Entity: Serialize + DeserializeOwned {
    /// Partition name, shared by all records of this type
    const KIND: &'static str;

    fn key(id: i64) -> RecordKey {
        RecordKey::new(Self::KIND, id)
    }
}

/// Read access to records
pub trait Repository {
    fn get_record(&self, key: &RecordKey) -> Option<&Value>;

    fn contains_record(&self, key: &RecordKey) -> bool {
        self.get_record(key).is_some()
    }

    /// Ids stored under `kind`, ascending
    fn record_ids(&self, kind: &str) -> Vec<i64>;
}

/// Read-write access to records
pub trait WriteableRepository: Repository {
    /// Insert or replace a record, returning the previous value
    fn store_record(&mut self, key: RecordKey, value: Value) -> Option<Value>;

    /// Remove a record, returning the previous value
    fn remove_record(&mut self, key: &RecordKey) -> Option<Value>;
}

/// The store of domain entities the executor mutates
///
/// `begin`/`commit`/`rollback` bracket one unit of work when the engine runs
/// with snapshot-rollback failover: `rollback` must restore exactly the state
/// observed at `begin`. Outside such a window all three are no-ops.
pub trait DomainRepository: WriteableRepository + Send {
    fn begin(&mut self);
    fn commit(&mut self);
    fn rollback(&mut self);

    /// Export every record, e.g. for a snapshot
    fn data(&self) -> RepositoryData;

    /// Replace the whole content with previously exported data
    fn restore(&mut self, data: RepositoryData);
}

/// Serializable export of a repository: kind → id → record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryData {
    pub records: BTreeMap<String, BTreeMap<i64, Value>>,
}

impl RepositoryData {
    pub fn len(&self) -> usize {
        self.records.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Greatest id stored under `kind`
    pub fn max_id(&self, kind: &str) -> Option<i64> {
        self.records
            .get(kind)
            .and_then(|records| records.keys().next_back().copied())
    }
}

/// Typed access on top of the raw repository traits
///
/// Implemented for every repository, including trait objects.
pub trait RepositoryExt {
    /// Deserialize the record with `id`, if present
    fn get<E: Entity>(&self, id: i64) -> Result<Option<E>>;

    /// Like [`get`](RepositoryExt::get), failing with `RecordNotFound` when absent
    fn load<E: Entity>(&self, id: i64) -> Result<E>;

    fn contains<E: Entity>(&self, id: i64) -> bool;

    fn ids<E: Entity>(&self) -> Vec<i64>;

    fn store<E: Entity>(&mut self, id: i64, entity: &E) -> Result<()>
    where
        Self: WriteableRepository;

    fn remove<E: Entity>(&mut self, id: i64) -> Result<Option<E>>
    where
        Self: WriteableRepository;
}

impl<R: Repository + ?Sized> RepositoryExt for R {
    fn get<E: Entity>(&self, id: i64) -> Result<Option<E>> {
        match self.get_record(&E::key(id)) {
            Some(value) => Ok(Some(E::deserialize(value)?)),
            None => Ok(None),
        }
    }

    fn load<E: Entity>(&self, id: i64) -> Result<E> {
        self.get::<E>(id)?
            .ok_or_else(|| KestrelError::RecordNotFound {
                kind: E::KIND.to_string(),
                id,
            })
    }

    fn contains<E: Entity>(&self, id: i64) -> bool {
        self.contains_record(&E::key(id))
    }

    fn ids<E: Entity>(&self) -> Vec<i64> {
        self.record_ids(E::KIND)
    }

    fn store<E: Entity>(&mut self, id: i64, entity: &E) -> Result<()>
    where
        Self: WriteableRepository,
    {
        let value = serde_json::to_value(entity)?;
        self.store_record(E::key(id), value);
        Ok(())
    }

    fn remove<E: Entity>(&mut self, id: i64) -> Result<Option<E>>
    where
        Self: WriteableRepository,
    {
        match self.remove_record(&E::key(id)) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}
