//! Transaction handler registry
//!
//! Apply-handlers and compensating handlers live in two independent maps keyed
//! by the runtime type of the transaction. Registration happens once at
//! startup; re-registering a type replaces the previous handler.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::context::TransactionContext;
use crate::errors::{KestrelError, Result};
use crate::payload::Payload;

/// Type-erased transaction handler
pub type TransactionHandler =
    Box<dyn Fn(&dyn Payload, &mut TransactionContext<'_>) -> Result<()> + Send + Sync>;

struct Entry {
    type_name: &'static str,
    handler: TransactionHandler,
}

/// Dispatches transactions to their apply or compensating handler
#[derive(Default)]
pub struct TransactionRegistry {
    handlers: HashMap<TypeId, Entry>,
    compensations: HashMap<TypeId, Entry>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the apply-handler for transactions of type `T`
    pub fn register<T, F>(&mut self, handler: F)
    where
        T: Payload,
        F: Fn(&T, &mut TransactionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register_with::<T, F>(handler, false);
    }

    /// Register the compensating handler for transactions of type `T`
    pub fn register_compensation<T, F>(&mut self, handler: F)
    where
        T: Payload,
        F: Fn(&T, &mut TransactionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register_with::<T, F>(handler, true);
    }

    /// Register a handler in the apply or the compensating map
    pub fn register_with<T, F>(&mut self, handler: F, is_compensating: bool)
    where
        T: Payload,
        F: Fn(&T, &mut TransactionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let erased: TransactionHandler =
            Box::new(move |payload: &dyn Payload, ctx: &mut TransactionContext<'_>| {
                let transaction =
                    payload
                        .downcast_ref::<T>()
                        .ok_or_else(|| KestrelError::PayloadMismatch {
                            expected: type_name.to_string(),
                            actual: payload.type_name().to_string(),
                        })?;
                handler(transaction, ctx)
            });

        let map = if is_compensating {
            &mut self.compensations
        } else {
            &mut self.handlers
        };
        let replaced = map
            .insert(
                TypeId::of::<T>(),
                Entry {
                    type_name,
                    handler: erased,
                },
            )
            .is_some();

        tracing::debug!(
            transaction = type_name,
            compensating = is_compensating,
            replaced,
            "transaction handler registered"
        );
    }

    /// Apply `transaction` through its registered handler
    ///
    /// # Errors
    ///
    /// `UnregisteredTransaction` when no apply-handler exists for the type,
    /// otherwise whatever the handler returns.
    pub fn execute(&self, transaction: &dyn Payload, ctx: &mut TransactionContext<'_>) -> Result<()> {
        match self.handlers.get(&transaction.payload_type()) {
            Some(entry) => (entry.handler)(transaction, ctx),
            None => Err(KestrelError::UnregisteredTransaction {
                type_name: transaction.type_name().to_string(),
            }),
        }
    }

    /// Undo `transaction` through its compensating handler
    ///
    /// A transaction type without a compensating handler is skipped silently.
    ///
    /// # Errors
    ///
    /// Whatever the compensating handler returns.
    pub fn compensate(
        &self,
        transaction: &dyn Payload,
        ctx: &mut TransactionContext<'_>,
    ) -> Result<()> {
        match self.compensations.get(&transaction.payload_type()) {
            Some(entry) => (entry.handler)(transaction, ctx),
            None => Ok(()),
        }
    }

    pub fn has_handler<T: Payload>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<T>())
    }

    pub fn has_compensation<T: Payload>(&self) -> bool {
        self.compensations.contains_key(&TypeId::of::<T>())
    }

    /// Whether `transaction` has a compensating handler
    pub fn is_compensatable(&self, transaction: &dyn Payload) -> bool {
        self.compensations.contains_key(&transaction.payload_type())
    }

    /// Number of transaction types with an apply-handler
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for TransactionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.values().map(|e| e.type_name).collect();
        let mut compensations: Vec<_> = self.compensations.values().map(|e| e.type_name).collect();
        handlers.sort_unstable();
        compensations.sort_unstable();
        f.debug_struct("TransactionRegistry")
            .field("handlers", &handlers)
            .field("compensations", &compensations)
            .finish()
    }
}
