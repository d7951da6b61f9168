//! Engine facade
//!
//! Owns every piece the execution pipeline borrows per unit and adds the
//! lifecycle around it: restore from the newest trustworthy snapshot at
//! startup, allocate transaction ids for live units, replay recorded
//! transactions and write checkpoints.

use std::any::Any;
use std::time::Instant;

use kestrel_core::{
    log_op_end, log_op_error, log_op_start, CommandContext, CommandRegistry, DomainRepository,
    FailoverStrategy, InMemoryRepository, KestrelError, Payload, RepositorySnapshotter, Result,
    SequenceIdGenerator, SnapshotIdentifier, TransactionContext, TransactionExecutor,
    TransactionRegistry, WorkUnit, WorkflowContext,
};
use kestrel_store::JsonSnapshotter;

use crate::config::EngineConfig;

const OP_STARTUP: &str = "startup";
const OP_CHECKPOINT: &str = "checkpoint";

/// Collects handlers and collaborators before the engine is sealed
///
/// Registration is only possible here; a built [`Engine`] never changes its
/// handler set.
pub struct EngineBuilder {
    config: EngineConfig,
    commands: CommandRegistry,
    transactions: TransactionRegistry,
    repository: Option<Box<dyn DomainRepository>>,
    snapshotter: Option<Box<dyn RepositorySnapshotter>>,
}

impl EngineBuilder {
    /// Apply-handler for transactions of type `T`
    pub fn transaction<T, F>(mut self, handler: F) -> Self
    where
        T: Payload,
        F: Fn(&T, &mut TransactionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.transactions.register::<T, F>(handler);
        self
    }

    /// Compensating handler for transactions of type `T`
    pub fn compensation<T, F>(mut self, handler: F) -> Self
    where
        T: Payload,
        F: Fn(&T, &mut TransactionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.transactions.register_compensation::<T, F>(handler);
        self
    }

    /// Handler for commands of type `C`
    pub fn command<C, R, F>(mut self, handler: F) -> Self
    where
        C: Payload,
        R: Any + Send,
        F: Fn(&C, &mut CommandContext<'_>) -> Result<R> + Send + Sync + 'static,
    {
        self.commands.register::<C, R, F>(handler);
        self
    }

    /// Replace the default in-memory domain repository
    pub fn repository(mut self, repository: impl DomainRepository + 'static) -> Self {
        self.repository = Some(Box::new(repository));
        self
    }

    /// Replace the snapshotter derived from `snapshot.dir`
    pub fn snapshotter(mut self, snapshotter: impl RepositorySnapshotter + 'static) -> Self {
        self.snapshotter = Some(Box::new(snapshotter));
        self
    }

    pub fn build(self) -> Engine {
        let snapshotter = self.snapshotter.or_else(|| {
            self.config
                .snapshot
                .dir
                .clone()
                .map(|dir| Box::new(JsonSnapshotter::in_dir(dir)) as Box<dyn RepositorySnapshotter>)
        });
        let failover = self.config.failover();

        tracing::debug!(
            failover = failover.as_str(),
            transactions = self.transactions.len() as u64,
            commands = self.commands.len() as u64,
            snapshots = snapshotter.is_some(),
            "engine built"
        );

        Engine {
            failover,
            repository: self
                .repository
                .unwrap_or_else(|| Box::new(InMemoryRepository::new())),
            commands: self.commands,
            transactions: self.transactions,
            ids: SequenceIdGenerator::new(),
            executor: TransactionExecutor::new(),
            snapshotter,
            last_transaction_id: 0,
            since_checkpoint: 0,
            config: self.config,
        }
    }
}

/// Single-writer engine around one domain repository
pub struct Engine {
    config: EngineConfig,
    failover: FailoverStrategy,
    repository: Box<dyn DomainRepository>,
    commands: CommandRegistry,
    transactions: TransactionRegistry,
    ids: SequenceIdGenerator,
    executor: TransactionExecutor,
    snapshotter: Option<Box<dyn RepositorySnapshotter>>,
    last_transaction_id: i64,
    since_checkpoint: u64,
}

impl Engine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            commands: CommandRegistry::new(),
            transactions: TransactionRegistry::new(),
            repository: None,
            snapshotter: None,
        }
    }

    /// Restore the newest trustworthy snapshot and seed id allocation
    ///
    /// A snapshot that fails verification is discarded and the next older
    /// generation is tried; when none is left the repository stays empty.
    ///
    /// # Errors
    ///
    /// Storage failures other than a corrupt snapshot.
    pub fn startup(&mut self) -> Result<()> {
        let start = Instant::now();
        log_op_start!(OP_STARTUP, failover = self.failover.as_str());

        if let Err(err) = self.restore_latest() {
            log_op_error!(
                OP_STARTUP,
                &err,
                duration_ms = start.elapsed().as_millis() as u64
            );
            return Err(err);
        }
        self.ids.seed_from(&self.repository.data());

        log_op_end!(
            OP_STARTUP,
            duration_ms = start.elapsed().as_millis() as u64,
            records = self.repository.data().len() as u64
        );
        Ok(())
    }

    fn restore_latest(&mut self) -> Result<()> {
        let Some(snapshotter) = self.snapshotter.as_deref() else {
            return Ok(());
        };

        loop {
            match snapshotter.load() {
                Ok(data) => {
                    self.repository.restore(data);
                    return Ok(());
                }
                Err(KestrelError::SnapshotNotFound) => return Ok(()),
                Err(err @ KestrelError::InvalidSnapshot { .. }) => {
                    tracing::warn!(error = %err, "discarding corrupt snapshot");
                    if !snapshotter.discard_latest()? {
                        return Ok(());
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Run one live unit made of `commands`
    pub fn execute(&mut self, commands: Vec<Box<dyn Payload>>) -> WorkUnit {
        let unit = self.live_unit(commands);
        self.run(unit)
    }

    /// Run `command` alone and hand back its result
    ///
    /// # Errors
    ///
    /// The unit's abort cause, or `PayloadMismatch` when the handler did not
    /// produce an `R`.
    pub fn execute_with_result<C: Payload, R: Any>(&mut self, command: C) -> Result<R> {
        let unit = self.live_unit(vec![Box::new(command)]).with_result();
        let mut unit = self.run(unit);
        if let Some(cause) = unit.abort_cause() {
            return Err(cause.clone());
        }
        let output = unit.take_result().ok_or_else(|| KestrelError::PayloadMismatch {
            expected: std::any::type_name::<R>().to_string(),
            actual: "no result".to_string(),
        })?;
        output
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| KestrelError::PayloadMismatch {
                expected: std::any::type_name::<R>().to_string(),
                actual: std::any::type_name::<C>().to_string(),
            })
    }

    /// Re-apply transactions recorded under `transaction_id`
    ///
    /// Live units started afterwards get transaction ids above every replayed
    /// one, and record ids above every record the replay created.
    pub fn replay(&mut self, transaction_id: i64, transactions: Vec<Box<dyn Payload>>) -> WorkUnit {
        self.last_transaction_id = self.last_transaction_id.max(transaction_id);
        self.run(WorkUnit::restore(transaction_id, transactions))
    }

    /// Snapshot the current repository state
    ///
    /// Returns `None` when no snapshotter is configured.
    ///
    /// # Errors
    ///
    /// Serialization or storage failures.
    pub fn checkpoint(&mut self) -> Result<Option<SnapshotIdentifier>> {
        let Some(snapshotter) = self.snapshotter.as_deref() else {
            return Ok(None);
        };
        let start = Instant::now();
        log_op_start!(OP_CHECKPOINT, transaction_id = self.last_transaction_id);

        let written = snapshotter
            .prepare()
            .and_then(|identifier| {
                snapshotter.snapshot(&self.repository.data(), &identifier)?;
                Ok(identifier)
            });
        match written {
            Ok(identifier) => {
                self.since_checkpoint = 0;
                log_op_end!(
                    OP_CHECKPOINT,
                    duration_ms = start.elapsed().as_millis() as u64,
                    snapshot_time = identifier.time
                );
                Ok(Some(identifier))
            }
            Err(err) => {
                log_op_error!(
                    OP_CHECKPOINT,
                    &err,
                    duration_ms = start.elapsed().as_millis() as u64
                );
                Err(err)
            }
        }
    }

    pub fn repository(&self) -> &dyn DomainRepository {
        &*self.repository
    }

    pub fn last_transaction_id(&self) -> i64 {
        self.last_transaction_id
    }

    pub fn failover(&self) -> FailoverStrategy {
        self.failover
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a failed recovery stopped the pipeline
    pub fn is_halted(&self) -> bool {
        self.executor.is_halted()
    }

    fn live_unit(&mut self, commands: Vec<Box<dyn Payload>>) -> WorkUnit {
        self.last_transaction_id += 1;
        commands
            .into_iter()
            .fold(WorkUnit::new(self.last_transaction_id), |unit, command| {
                unit.with_boxed_command(command)
            })
    }

    fn run(&mut self, mut unit: WorkUnit) -> WorkUnit {
        self.executor.execute_commands(
            &mut unit,
            WorkflowContext {
                repository: &mut *self.repository,
                commands: &self.commands,
                transactions: &self.transactions,
                id_generator: &mut self.ids,
                failover: self.failover,
            },
        );

        if unit.is_aborted() {
            return unit;
        }
        if unit.is_restore() {
            // replayed transactions may have created records with ids never handed out here
            self.ids.seed_from(&self.repository.data());
        } else {
            self.since_checkpoint += 1;
            let every = self.config.snapshot.every;
            if every > 0 && self.since_checkpoint >= every {
                if let Err(err) = self.checkpoint() {
                    tracing::warn!(error = %err, "automatic checkpoint failed");
                }
            }
        }
        unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::RecordKey;
    use kestrel_core::{Repository, WriteableRepository};
    use serde_json::json;

    #[derive(Debug)]
    struct Put(i64);

    #[derive(Debug)]
    struct Stored(i64);

    fn engine() -> Engine {
        Engine::builder(EngineConfig::default())
            .command::<Put, i64, _>(|cmd, ctx| {
                ctx.execute_transaction(Stored(cmd.0));
                Ok(cmd.0)
            })
            .transaction::<Stored, _>(|tx, ctx| {
                ctx.repo()
                    .store_record(RecordKey::new("item", tx.0), json!({ "id": tx.0 }));
                Ok(())
            })
            .build()
    }

    #[test]
    fn test_live_units_get_increasing_transaction_ids() {
        let mut engine = engine();

        let first = engine.execute(vec![Box::new(Put(1))]);
        let second = engine.execute(vec![Box::new(Put(2))]);

        assert_eq!(first.transaction_id(), 1);
        assert_eq!(second.transaction_id(), 2);
        assert_eq!(engine.last_transaction_id(), 2);
        assert!(engine.repository().contains_record(&RecordKey::new("item", 2)));
    }

    #[test]
    fn test_replay_advances_transaction_ids() {
        let mut engine = engine();

        let replayed = engine.replay(40, vec![Box::new(Stored(7))]);
        let live = engine.execute(vec![Box::new(Put(8))]);

        assert!(!replayed.is_aborted());
        assert_eq!(live.transaction_id(), 41);
    }

    #[test]
    fn test_execute_with_result_downcasts() {
        let mut engine = engine();

        let value: i64 = engine.execute_with_result(Put(5)).unwrap();

        assert_eq!(value, 5);
    }

    #[test]
    fn test_execute_with_result_wrong_type_is_mismatch() {
        let mut engine = engine();

        let err = engine.execute_with_result::<_, String>(Put(5)).unwrap_err();

        assert!(matches!(err, KestrelError::PayloadMismatch { .. }));
    }

    #[test]
    fn test_checkpoint_without_snapshotter_is_none() {
        let mut engine = engine();
        assert_eq!(engine.checkpoint().unwrap(), None);
    }
}
