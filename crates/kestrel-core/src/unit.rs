//! Unit of work
//!
//! A [`WorkUnit`] is the atomic batch handed to the executor by the delivery
//! mechanism: an ordered list of commands (live units) or of already recorded
//! transactions (restore units), plus the slots the executor fills in while
//! running it.

use std::any::Any;
use std::collections::BTreeSet;

use kestrel_core_types::RecordKey;

use crate::errors::KestrelError;
use crate::payload::{debug_assert_unboxed, Payload};

/// An event published by a transaction handler, stamped with its unit
#[derive(Debug)]
pub struct EventEnvelope {
    pub transaction_id: i64,
    pub payload: Box<dyn Payload>,
}

/// Downstream transport for events of committed units
pub trait EventPublisher {
    fn publish(&mut self, envelope: EventEnvelope);
}

/// One atomic batch of commands-then-transactions
#[derive(Debug)]
pub struct WorkUnit {
    pub(crate) transaction_id: i64,
    pub(crate) commands: Vec<Box<dyn Payload>>,
    pub(crate) transactions: Vec<Box<dyn Payload>>,
    pub(crate) restore: bool,
    pub(crate) wants_result: bool,
    pub(crate) result: Option<Box<dyn Any + Send>>,
    pub(crate) abort_cause: Option<KestrelError>,
    pub(crate) recovery_failure: Option<KestrelError>,
    pub(crate) marked_records: BTreeSet<RecordKey>,
    pub(crate) events: Vec<EventEnvelope>,
}

impl WorkUnit {
    /// Create an empty live unit
    pub fn new(transaction_id: i64) -> Self {
        Self {
            transaction_id,
            commands: Vec::new(),
            transactions: Vec::new(),
            restore: false,
            wants_result: false,
            result: None,
            abort_cause: None,
            recovery_failure: None,
            marked_records: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    /// Create a restore unit carrying transactions recovered from a log
    pub fn restore(transaction_id: i64, transactions: Vec<Box<dyn Payload>>) -> Self {
        Self {
            restore: true,
            transactions,
            ..Self::new(transaction_id)
        }
    }

    /// Append a command
    pub fn with_command<C: Payload>(mut self, command: C) -> Self {
        debug_assert_unboxed::<C>();
        self.commands.push(Box::new(command));
        self
    }

    /// Append an already boxed command
    pub fn with_boxed_command(mut self, command: Box<dyn Payload>) -> Self {
        self.commands.push(command);
        self
    }

    /// Ask the executor to keep the return value of the commands
    pub fn with_result(mut self) -> Self {
        self.wants_result = true;
        self
    }

    pub fn transaction_id(&self) -> i64 {
        self.transaction_id
    }

    pub fn is_restore(&self) -> bool {
        self.restore
    }

    pub fn wants_result(&self) -> bool {
        self.wants_result
    }

    pub fn commands(&self) -> &[Box<dyn Payload>] {
        &self.commands
    }

    /// Transactions produced by the commands (or carried by a restore unit)
    pub fn transactions(&self) -> &[Box<dyn Payload>] {
        &self.transactions
    }

    /// Hand the transaction list over, e.g. to a journal writer
    pub fn take_transactions(&mut self) -> Vec<Box<dyn Payload>> {
        std::mem::take(&mut self.transactions)
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_cause.is_some()
    }

    pub fn abort_cause(&self) -> Option<&KestrelError> {
        self.abort_cause.as_ref()
    }

    /// Fault raised while undoing this unit, if recovery itself failed
    pub fn recovery_failure(&self) -> Option<&KestrelError> {
        self.recovery_failure.as_ref()
    }

    /// Result of the last command, if requested and of type `R`
    pub fn result<R: Any>(&self) -> Option<&R> {
        self.result.as_ref().and_then(|r| r.downcast_ref::<R>())
    }

    pub fn take_result(&mut self) -> Option<Box<dyn Any + Send>> {
        self.result.take()
    }

    /// Records touched while applying this unit's transactions
    pub fn marked_records(&self) -> &BTreeSet<RecordKey> {
        &self.marked_records
    }

    /// Events buffered by transaction handlers, in publication order
    pub fn events(&self) -> &[EventEnvelope] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<EventEnvelope> {
        std::mem::take(&mut self.events)
    }

    /// Forward buffered events to the transport if the unit committed
    ///
    /// Returns the number of events published. Events of an aborted unit are
    /// dropped.
    pub fn publish_events(&mut self, publisher: &mut dyn EventPublisher) -> usize {
        let events = self.drain_events();
        if self.is_aborted() {
            return 0;
        }
        let count = events.len();
        for envelope in events {
            publisher.publish(envelope);
        }
        count
    }

    pub(crate) fn abort(&mut self, cause: KestrelError) {
        self.result = None;
        self.abort_cause = Some(cause);
    }
}
