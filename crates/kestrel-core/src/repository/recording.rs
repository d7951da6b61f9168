use std::cell::RefCell;
use std::collections::BTreeSet;

use kestrel_core_types::RecordKey;
use serde_json::Value;

use super::{DomainRepository, Repository, WriteableRepository};

/// Repository wrapper that records which records a unit touched
///
/// Bound to the domain repository and the unit's marked-records set for the
/// duration of one unit. While read-marking is enabled every read, write and
/// removal adds its key to the set; while disabled nothing is recorded. The
/// executor disables marking around command dispatch so that reads made to
/// decide what to do never pollute the set.
pub struct RecordingRepository<'r> {
    inner: &'r mut dyn DomainRepository,
    marked: RefCell<BTreeSet<RecordKey>>,
    read_mark: bool,
}

impl<'r> RecordingRepository<'r> {
    /// Bind to a repository with read-marking enabled
    pub fn bind(inner: &'r mut dyn DomainRepository, marked: BTreeSet<RecordKey>) -> Self {
        Self {
            inner,
            marked: RefCell::new(marked),
            read_mark: true,
        }
    }

    pub fn enable_read_mark(&mut self) {
        self.read_mark = true;
    }

    pub fn disable_read_mark(&mut self) {
        self.read_mark = false;
    }

    pub fn is_read_mark_enabled(&self) -> bool {
        self.read_mark
    }

    /// Keys recorded so far
    pub fn marked(&self) -> BTreeSet<RecordKey> {
        self.marked.borrow().clone()
    }

    /// The wrapped repository, bypassing read-marking
    pub fn inner_mut(&mut self) -> &mut dyn DomainRepository {
        &mut *self.inner
    }

    /// Unbind, handing the marked set back to its unit
    pub fn release(self) -> BTreeSet<RecordKey> {
        self.marked.into_inner()
    }

    fn mark(&self, key: &RecordKey) {
        if self.read_mark {
            self.marked.borrow_mut().insert(key.clone());
        }
    }
}

impl Repository for RecordingRepository<'_> {
    fn get_record(&self, key: &RecordKey) -> Option<&Value> {
        self.mark(key);
        self.inner.get_record(key)
    }

    fn contains_record(&self, key: &RecordKey) -> bool {
        self.mark(key);
        self.inner.contains_record(key)
    }

    fn record_ids(&self, kind: &str) -> Vec<i64> {
        self.inner.record_ids(kind)
    }
}

impl WriteableRepository for RecordingRepository<'_> {
    fn store_record(&mut self, key: RecordKey, value: Value) -> Option<Value> {
        self.mark(&key);
        self.inner.store_record(key, value)
    }

    fn remove_record(&mut self, key: &RecordKey) -> Option<Value> {
        self.mark(key);
        self.inner.remove_record(key)
    }
}
