//! Id allocation for new records

use std::collections::HashMap;

use crate::repository::RepositoryData;

/// Hands out ids for new records, distinct per kind
pub trait IdGenerator: Send {
    fn next(&mut self, kind: &str) -> i64;
}

/// Per-kind monotonically increasing counters starting at 1
#[derive(Debug, Clone, Default)]
pub struct SequenceIdGenerator {
    last: HashMap<String, i64>,
}

impl SequenceIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after the greatest id of every kind in `data`
    pub fn seeded_from(data: &RepositoryData) -> Self {
        let mut generator = Self::new();
        generator.seed_from(data);
        generator
    }

    /// Raise counters so the next id of each kind exceeds every stored id
    ///
    /// Counters never move backwards.
    pub fn seed_from(&mut self, data: &RepositoryData) {
        for kind in data.records.keys() {
            if let Some(max) = data.max_id(kind) {
                self.seed(kind, max);
            }
        }
    }

    /// Make sure the next id handed out for `kind` is greater than `id`
    pub fn seed(&mut self, kind: &str, id: i64) {
        let last = self.last.entry(kind.to_string()).or_insert(0);
        if id > *last {
            *last = id;
        }
    }

    /// Last id handed out (or seeded) for `kind`
    pub fn current(&self, kind: &str) -> i64 {
        self.last.get(kind).copied().unwrap_or(0)
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next(&mut self, kind: &str) -> i64 {
        let last = self.last.entry(kind.to_string()).or_insert(0);
        *last += 1;
        *last
    }
}
