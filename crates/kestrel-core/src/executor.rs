//! Transaction execution pipeline
//!
//! [`TransactionExecutor::execute_commands`] runs one [`WorkUnit`] end to end:
//!
//! 1. bind the unit: scope the event bus to its transaction id, wrap the
//!    domain repository in a [`RecordingRepository`] holding the unit's marked
//!    set and clear the scratch map
//! 2. `begin` the repository window (snapshot-rollback failover only)
//! 3. restore units re-apply their recorded transactions in order; live units
//!    dispatch each command with read-marking disabled, then apply the
//!    transactions it appended
//! 4. `commit` the window (snapshot-rollback failover only)
//!
//! Any failure in 2-4, including a handler panic, aborts the unit and runs
//! recovery: a repository rollback, or the compensating handlers of every
//! applied transaction in reverse order. Nothing propagates to the caller.
//!
//! A fault raised during recovery, including a panicking repository
//! rollback, halts the executor. The unit records the
//! fault as its recovery failure and every later unit is aborted with
//! `ExecutorHalted` without touching the repository.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use crate::commands::{CommandOutput, CommandsManager};
use crate::context::{CommandContext, ScratchData, TransactionContext, UnitEventBus};
use crate::errors::{ExErrorKind, KestrelError, Result};
use crate::failover::FailoverStrategy;
use crate::ids::IdGenerator;
use crate::payload::{short_name, Payload};
use crate::registry::TransactionRegistry;
use crate::repository::{DomainRepository, RecordingRepository};
use crate::unit::WorkUnit;
use crate::{log_op_end, log_op_error, log_op_start};

const OP_EXECUTE: &str = "execute_commands";
const OP_ROLLBACK: &str = "rollback";
const OP_COMPENSATE: &str = "compensate";

/// Services a unit runs against
pub struct WorkflowContext<'a> {
    pub repository: &'a mut dyn DomainRepository,
    pub commands: &'a dyn CommandsManager,
    pub transactions: &'a TransactionRegistry,
    pub id_generator: &'a mut dyn IdGenerator,
    pub failover: FailoverStrategy,
}

/// Runs units of work against one domain-model partition
///
/// Holds the scratch map reused across units and the halt flag. Taking
/// `&mut self` keeps a single unit bound at a time.
#[derive(Debug, Default)]
pub struct TransactionExecutor {
    scratch: ScratchData,
    halted: Option<String>,
}

impl TransactionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a failed recovery stopped this executor
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Run `unit` to completion, recording any failure on the unit
    pub fn execute_commands(&mut self, unit: &mut WorkUnit, services: WorkflowContext<'_>) {
        let start = Instant::now();
        let transaction_id = unit.transaction_id;
        log_op_start!(
            OP_EXECUTE,
            transaction_id = transaction_id,
            restore = unit.restore,
            commands_len = unit.commands.len() as u64,
            failover = services.failover.as_str()
        );

        if let Some(reason) = &self.halted {
            let cause = KestrelError::ExecutorHalted {
                reason: reason.clone(),
            };
            log_op_error!(
                OP_EXECUTE,
                &cause,
                duration_ms = start.elapsed().as_millis() as u64,
                transaction_id = transaction_id
            );
            unit.abort(cause);
            return;
        }

        self.scratch.clear();
        let WorkflowContext {
            repository,
            commands: manager,
            transactions: registry,
            id_generator,
            failover,
        } = services;

        let marked = std::mem::take(&mut unit.marked_records);
        let mut scope = UnitScope {
            repository: RecordingRepository::bind(repository, marked),
            event_bus: UnitEventBus::new(transaction_id, &mut unit.events),
            scratch: &mut self.scratch,
            registry,
            applied: 0,
        };

        let mut result: CommandOutput = None;
        failover.begin(scope.repository.inner_mut());
        let outcome = if unit.restore {
            replay(&mut scope, &unit.transactions)
        } else {
            run_live(
                &mut scope,
                &unit.commands,
                &mut unit.transactions,
                manager,
                id_generator,
                unit.wants_result,
                &mut result,
            )
        };

        let recovery_failure = match &outcome {
            Ok(()) => {
                failover.commit(scope.repository.inner_mut());
                None
            }
            Err(cause) => {
                log_op_error!(
                    OP_EXECUTE,
                    cause,
                    duration_ms = start.elapsed().as_millis() as u64,
                    transaction_id = transaction_id,
                    applied_len = scope.applied as u64
                );
                recover(&mut scope, failover, &unit.transactions, transaction_id)
            }
        };

        let applied = scope.applied;
        unit.marked_records = scope.repository.release();

        match outcome {
            Ok(()) => {
                if unit.wants_result {
                    unit.result = result;
                }
                log_op_end!(
                    OP_EXECUTE,
                    duration_ms = start.elapsed().as_millis() as u64,
                    transaction_id = transaction_id,
                    transactions_len = unit.transactions.len() as u64,
                    marked_len = unit.marked_records.len() as u64
                );
            }
            Err(cause) => {
                unit.abort(cause);
                if let Some(failure) = recovery_failure {
                    self.halted = Some(format!(
                        "recovery of transaction {} failed: {}",
                        transaction_id, failure
                    ));
                    tracing::error!(
                        transaction_id,
                        applied_len = applied as u64,
                        err.code = ExErrorKind::RecoveryFailed.code(),
                        "executor halted"
                    );
                    unit.recovery_failure = Some(failure);
                }
            }
        }
    }
}

/// Borrowed state of the unit currently bound to the executor
struct UnitScope<'u> {
    repository: RecordingRepository<'u>,
    event_bus: UnitEventBus<'u>,
    scratch: &'u mut ScratchData,
    registry: &'u TransactionRegistry,
    /// Transactions applied successfully so far, a prefix of the unit's list
    applied: usize,
}

impl UnitScope<'_> {
    fn apply(&mut self, transaction: &dyn Payload) -> Result<()> {
        let registry = self.registry;
        let mut ctx = TransactionContext::new(
            &mut self.repository,
            self.event_bus.reborrow(),
            &mut *self.scratch,
        );
        guarded(short_name(transaction.type_name()), || {
            registry.execute(transaction, &mut ctx)
        })?;
        self.applied += 1;
        Ok(())
    }

    fn compensate(&mut self, transaction: &dyn Payload) -> Result<()> {
        let registry = self.registry;
        let mut ctx = TransactionContext::new(
            &mut self.repository,
            self.event_bus.reborrow(),
            &mut *self.scratch,
        );
        guarded(short_name(transaction.type_name()), || {
            registry.compensate(transaction, &mut ctx)
        })
    }
}

fn replay(scope: &mut UnitScope<'_>, transactions: &[Box<dyn Payload>]) -> Result<()> {
    for transaction in transactions {
        scope.apply(&**transaction)?;
    }
    Ok(())
}

fn run_live(
    scope: &mut UnitScope<'_>,
    commands: &[Box<dyn Payload>],
    transactions: &mut Vec<Box<dyn Payload>>,
    manager: &dyn CommandsManager,
    id_generator: &mut dyn IdGenerator,
    wants_result: bool,
    result: &mut CommandOutput,
) -> Result<()> {
    let mut cursor = transactions.len();
    for command in commands {
        let command: &dyn Payload = &**command;

        scope.repository.disable_read_mark();
        let dispatched = {
            let mut ctx = CommandContext::new(&scope.repository, transactions, &mut *id_generator);
            guarded(short_name(command.type_name()), || manager.execute(command, &mut ctx))
        };
        scope.repository.enable_read_mark();
        let output = dispatched?;

        while cursor < transactions.len() {
            scope.apply(&*transactions[cursor])?;
            cursor += 1;
        }
        if wants_result {
            *result = output;
        }
    }
    Ok(())
}

/// Undo what the failed unit did; returns the first fault raised while undoing
fn recover(
    scope: &mut UnitScope<'_>,
    failover: FailoverStrategy,
    transactions: &[Box<dyn Payload>],
    transaction_id: i64,
) -> Option<KestrelError> {
    let start = Instant::now();
    match failover {
        FailoverStrategy::SnapshotRollback => {
            log_op_start!(OP_ROLLBACK, transaction_id = transaction_id);
            let repository = scope.repository.inner_mut();
            match guarded(OP_ROLLBACK, || {
                repository.rollback();
                Ok(())
            }) {
                Ok(()) => {
                    log_op_end!(
                        OP_ROLLBACK,
                        duration_ms = start.elapsed().as_millis() as u64,
                        transaction_id = transaction_id
                    );
                    None
                }
                Err(err) => {
                    log_op_error!(
                        OP_ROLLBACK,
                        &err,
                        duration_ms = start.elapsed().as_millis() as u64,
                        transaction_id = transaction_id
                    );
                    Some(err)
                }
            }
        }
        FailoverStrategy::Compensation => {
            let applied = scope.applied;
            log_op_start!(
                OP_COMPENSATE,
                transaction_id = transaction_id,
                applied_len = applied as u64
            );
            let mut failure = None;
            // Strictly backward over the applied prefix only
            for transaction in transactions[..applied].iter().rev() {
                if let Err(err) = scope.compensate(&**transaction) {
                    tracing::warn!(
                        transaction_id,
                        transaction = short_name(transaction.type_name()),
                        error = %err,
                        "compensating handler failed"
                    );
                    failure.get_or_insert(err);
                }
            }
            match &failure {
                None => {
                    log_op_end!(
                        OP_COMPENSATE,
                        duration_ms = start.elapsed().as_millis() as u64,
                        transaction_id = transaction_id
                    );
                }
                Some(err) => {
                    log_op_error!(
                        OP_COMPENSATE,
                        err,
                        duration_ms = start.elapsed().as_millis() as u64,
                        transaction_id = transaction_id
                    );
                }
            }
            failure
        }
    }
}

/// Run a handler or repository call, turning a panic into `HandlerPanicked`
fn guarded<T>(op: &str, handler: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(handler)).map_err(|panic| KestrelError::HandlerPanicked {
        op: op.to_string(),
        message: panic_message(&*panic),
    })?
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
