use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use kestrel_core_types::RecordKey;
use serde_json::Value;

use super::{DomainRepository, Repository, RepositoryData, WriteableRepository};

/// In-memory domain repository
///
/// Records are kept in ordered maps so exports are deterministic. Between
/// `begin` and `commit`/`rollback` the repository journals the first
/// pre-image of every key it mutates; `rollback` writes those pre-images back,
/// restoring exactly the state observed at `begin`.
/// Not thread-safe (no Arc/RwLock) - owned by a single executor.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    records: BTreeMap<String, BTreeMap<i64, Value>>,
    /// Pre-images of keys mutated inside the open window
    window: Option<BTreeMap<RecordKey, Option<Value>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from exported data
    pub fn from_data(data: RepositoryData) -> Self {
        Self {
            records: data.records,
            window: None,
        }
    }

    /// Total number of records across all kinds
    pub fn len(&self) -> usize {
        self.records.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a `begin` is waiting for its `commit`/`rollback`
    pub fn in_window(&self) -> bool {
        self.window.is_some()
    }

    fn remember(&mut self, key: &RecordKey) {
        let previous = self
            .records
            .get(&key.kind)
            .and_then(|records| records.get(&key.id))
            .cloned();
        if let Some(window) = self.window.as_mut() {
            window.entry(key.clone()).or_insert(previous);
        }
    }

    fn put(&mut self, key: RecordKey, value: Option<Value>) -> Option<Value> {
        match value {
            Some(value) => self.records.entry(key.kind).or_default().insert(key.id, value),
            None => match self.records.entry(key.kind) {
                Entry::Occupied(mut kind) => {
                    let previous = kind.get_mut().remove(&key.id);
                    if kind.get().is_empty() {
                        kind.remove();
                    }
                    previous
                }
                Entry::Vacant(_) => None,
            },
        }
    }
}

impl Repository for InMemoryRepository {
    fn get_record(&self, key: &RecordKey) -> Option<&Value> {
        self.records
            .get(&key.kind)
            .and_then(|records| records.get(&key.id))
    }

    fn record_ids(&self, kind: &str) -> Vec<i64> {
        self.records
            .get(kind)
            .map(|records| records.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl WriteableRepository for InMemoryRepository {
    fn store_record(&mut self, key: RecordKey, value: Value) -> Option<Value> {
        if self.window.is_some() {
            self.remember(&key);
        }
        self.put(key, Some(value))
    }

    fn remove_record(&mut self, key: &RecordKey) -> Option<Value> {
        if self.window.is_some() {
            self.remember(key);
        }
        self.put(key.clone(), None)
    }
}

impl DomainRepository for InMemoryRepository {
    fn begin(&mut self) {
        // Nested begin keeps the outer pre-images
        if self.window.is_none() {
            self.window = Some(BTreeMap::new());
        }
    }

    fn commit(&mut self) {
        self.window = None;
    }

    fn rollback(&mut self) {
        if let Some(window) = self.window.take() {
            for (key, previous) in window {
                self.put(key, previous);
            }
        }
    }

    fn data(&self) -> RepositoryData {
        RepositoryData {
            records: self.records.clone(),
        }
    }

    fn restore(&mut self, data: RepositoryData) {
        self.records = data.records;
        self.window = None;
    }
}
