//! Execution contexts handed to handlers
//!
//! Both contexts are short-lived views the executor builds over the unit it is
//! currently running. Handlers receive them by `&mut` for the duration of one
//! call and cannot retain them.
//!
//! - [`CommandContext`]: read-only repository, id allocation and the ability
//!   to schedule transactions. Command handlers never mutate state directly.
//! - [`TransactionContext`]: read-write repository, the unit-scoped event bus
//!   and the per-unit scratch map.

use std::any::Any;
use std::collections::HashMap;

use crate::ids::IdGenerator;
use crate::payload::{debug_assert_unboxed, Payload};
use crate::repository::{Entity, Repository, WriteableRepository};
use crate::unit::EventEnvelope;

/// Per-unit key-value scratch space shared by the transactions of one unit
///
/// Cleared by the executor when a unit is bound, never between the
/// transactions of the same unit.
#[derive(Debug, Default)]
pub struct ScratchData {
    entries: HashMap<String, Box<dyn Any + Send>>,
}

impl ScratchData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning true if it replaced an existing entry
    pub fn insert<V: Any + Send>(&mut self, key: impl Into<String>, value: V) -> bool {
        self.entries.insert(key.into(), Box::new(value)).is_some()
    }

    /// Typed lookup; `None` when absent or of another type
    pub fn get<V: Any>(&self, key: &str) -> Option<&V> {
        self.entries.get(key).and_then(|v| v.downcast_ref::<V>())
    }

    pub fn get_mut<V: Any>(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key).and_then(|v| v.downcast_mut::<V>())
    }

    pub fn remove(&mut self, key: &str) -> Option<Box<dyn Any + Send>> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Event bus view scoped to one unit's transaction id
pub struct UnitEventBus<'a> {
    transaction_id: i64,
    sink: &'a mut Vec<EventEnvelope>,
}

impl<'a> UnitEventBus<'a> {
    pub(crate) fn new(transaction_id: i64, sink: &'a mut Vec<EventEnvelope>) -> Self {
        Self {
            transaction_id,
            sink,
        }
    }

    pub(crate) fn reborrow(&mut self) -> UnitEventBus<'_> {
        UnitEventBus {
            transaction_id: self.transaction_id,
            sink: &mut *self.sink,
        }
    }

    pub fn transaction_id(&self) -> i64 {
        self.transaction_id
    }

    /// Publish an event on behalf of the current unit
    pub fn publish_event<E: Payload>(&mut self, event: E) {
        debug_assert_unboxed::<E>();
        self.sink.push(EventEnvelope {
            transaction_id: self.transaction_id,
            payload: Box::new(event),
        });
    }
}

/// Context passed to command handlers
pub struct CommandContext<'a> {
    repository: &'a dyn Repository,
    transactions: &'a mut Vec<Box<dyn Payload>>,
    id_generator: &'a mut dyn IdGenerator,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        repository: &'a dyn Repository,
        transactions: &'a mut Vec<Box<dyn Payload>>,
        id_generator: &'a mut dyn IdGenerator,
    ) -> Self {
        Self {
            repository,
            transactions,
            id_generator,
        }
    }

    /// Read-only view of the domain model
    pub fn repo(&self) -> &'a dyn Repository {
        self.repository
    }

    /// Allocate the next id for entity type `E`
    pub fn id<E: Entity>(&mut self) -> i64 {
        self.id_generator.next(E::KIND)
    }

    /// Allocate the next id for an arbitrary kind
    pub fn id_for(&mut self, kind: &str) -> i64 {
        self.id_generator.next(kind)
    }

    /// Schedule a transaction to be applied after this command returns
    pub fn execute_transaction<T: Payload>(&mut self, transaction: T) -> &mut Self {
        debug_assert_unboxed::<T>();
        self.transactions.push(Box::new(transaction));
        self
    }

    /// Schedule an already boxed transaction
    pub fn execute_boxed(&mut self, transaction: Box<dyn Payload>) -> &mut Self {
        self.transactions.push(transaction);
        self
    }

    /// Same as [`execute_transaction`](CommandContext::execute_transaction)
    pub fn execute_tx_action<T: Payload>(&mut self, transaction: T) -> &mut Self {
        self.execute_transaction(transaction)
    }

    /// Number of transactions the unit holds so far
    pub fn scheduled(&self) -> usize {
        self.transactions.len()
    }
}

/// Context passed to transaction and compensation handlers
pub struct TransactionContext<'a> {
    repository: &'a mut dyn WriteableRepository,
    event_bus: UnitEventBus<'a>,
    data: &'a mut ScratchData,
}

impl<'a> TransactionContext<'a> {
    pub(crate) fn new(
        repository: &'a mut dyn WriteableRepository,
        event_bus: UnitEventBus<'a>,
        data: &'a mut ScratchData,
    ) -> Self {
        Self {
            repository,
            event_bus,
            data,
        }
    }

    /// Read-write view of the domain model
    pub fn repo(&mut self) -> &mut (dyn WriteableRepository + 'a) {
        &mut *self.repository
    }

    pub fn event_bus(&mut self) -> &mut UnitEventBus<'a> {
        &mut self.event_bus
    }

    /// Scratch map shared with the other transactions of this unit
    pub fn data(&mut self) -> &mut ScratchData {
        &mut *self.data
    }
}
