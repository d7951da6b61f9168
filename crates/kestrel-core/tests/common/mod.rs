//! Shared fixtures: a small bank domain with journaling handlers

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use kestrel_core::{
    CommandRegistry, DomainRepository, Entity, FailoverStrategy, InMemoryRepository, KestrelError,
    RecordKey, Repository, RepositoryData, RepositoryExt, SequenceIdGenerator,
    TransactionExecutor, TransactionRegistry, WorkUnit, WorkflowContext, WriteableRepository,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub balance: i64,
}

impl Entity for Account {
    const KIND: &'static str = "account";
}

/// Read by commands only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub max_deposit: i64,
}

impl Entity for Limits {
    const KIND: &'static str = "limits";
}

// ----- commands -----

#[derive(Debug)]
pub struct OpenAccount {
    pub balance: i64,
}

#[derive(Debug)]
pub struct Deposit {
    pub account: i64,
    pub amount: i64,
}

#[derive(Debug)]
pub struct Withdraw {
    pub account: i64,
    pub amount: i64,
}

#[derive(Debug)]
pub struct Transfer {
    pub from: i64,
    pub to: i64,
    pub amount: i64,
}

/// Rejected before scheduling anything
#[derive(Debug)]
pub struct Refuse;

/// Schedules a transaction whose compensation fails, then one that fails
#[derive(Debug)]
pub struct Poison {
    pub account: i64,
}

/// Schedules a transaction type nobody handles
#[derive(Debug)]
pub struct Orphan;

// ----- transactions -----

#[derive(Debug)]
pub struct AccountCreated {
    pub id: i64,
    pub balance: i64,
}

#[derive(Debug)]
pub struct Credited {
    pub account: i64,
    pub amount: i64,
}

#[derive(Debug)]
pub struct Debited {
    pub account: i64,
    pub amount: i64,
}

#[derive(Debug)]
pub struct Poisoned {
    pub account: i64,
}

#[derive(Debug)]
pub struct Faulty;

#[derive(Debug)]
pub struct Unhandled;

// ----- events -----

#[derive(Debug, PartialEq)]
pub struct BalanceChanged {
    pub account: i64,
    pub balance: i64,
}

pub type Journal = Arc<Mutex<Vec<String>>>;

fn note(journal: &Journal, entry: String) {
    journal.lock().unwrap().push(entry);
}

/// Handlers of the bank domain, each writing what it did to a shared journal
pub struct Bank {
    pub commands: CommandRegistry,
    pub transactions: TransactionRegistry,
    pub journal: Journal,
}

pub fn bank() -> Bank {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let mut commands = CommandRegistry::new();
    let mut transactions = TransactionRegistry::new();

    let j = journal.clone();
    commands.register::<OpenAccount, _, _>(move |cmd, ctx| {
        note(&j, "command:OpenAccount".into());
        let id = ctx.id::<Account>();
        ctx.execute_transaction(AccountCreated {
            id,
            balance: cmd.balance,
        });
        Ok(id)
    });

    let j = journal.clone();
    commands.register::<Deposit, _, _>(move |cmd, ctx| {
        note(&j, "command:Deposit".into());
        if let Some(limits) = ctx.repo().get::<Limits>(1)? {
            if cmd.amount > limits.max_deposit {
                return Err(KestrelError::rejected("deposit above limit"));
            }
        }
        ctx.execute_transaction(Credited {
            account: cmd.account,
            amount: cmd.amount,
        });
        Ok(cmd.amount)
    });

    let j = journal.clone();
    commands.register::<Withdraw, _, _>(move |cmd, ctx| {
        note(&j, "command:Withdraw".into());
        ctx.execute_transaction(Debited {
            account: cmd.account,
            amount: cmd.amount,
        });
        Ok(())
    });

    let j = journal.clone();
    commands.register::<Transfer, _, _>(move |cmd, ctx| {
        note(&j, "command:Transfer".into());
        let from = ctx.repo().load::<Account>(cmd.from)?;
        ctx.repo().load::<Account>(cmd.to)?;
        ctx.execute_transaction(Debited {
            account: cmd.from,
            amount: cmd.amount,
        })
        .execute_transaction(Credited {
            account: cmd.to,
            amount: cmd.amount,
        });
        Ok(from.balance - cmd.amount)
    });

    let j = journal.clone();
    commands.register::<Refuse, (), _>(move |_, _| {
        note(&j, "command:Refuse".into());
        Err(KestrelError::rejected("refused"))
    });

    commands.register::<Poison, _, _>(|cmd, ctx| {
        ctx.execute_transaction(Poisoned {
            account: cmd.account,
        })
        .execute_transaction(Faulty);
        Ok(())
    });

    commands.register::<Orphan, _, _>(|_, ctx| {
        ctx.execute_transaction(Unhandled);
        Ok(())
    });

    let j = journal.clone();
    transactions.register::<AccountCreated, _>(move |tx, ctx| {
        note(&j, format!("apply:AccountCreated#{}", tx.id));
        ctx.repo().store(tx.id, &Account { balance: tx.balance })
    });

    let j = journal.clone();
    transactions.register_compensation::<AccountCreated, _>(move |tx, ctx| {
        note(&j, format!("compensate:AccountCreated#{}", tx.id));
        ctx.repo().remove::<Account>(tx.id).map(|_| ())
    });

    let j = journal.clone();
    transactions.register::<Credited, _>(move |tx, ctx| {
        let mut account = ctx.repo().load::<Account>(tx.account)?;
        account.balance += tx.amount;
        ctx.repo().store(tx.account, &account)?;
        ctx.event_bus().publish_event(BalanceChanged {
            account: tx.account,
            balance: account.balance,
        });
        note(&j, format!("apply:Credited#{}", tx.account));
        Ok(())
    });

    let j = journal.clone();
    transactions.register_compensation::<Credited, _>(move |tx, ctx| {
        let mut account = ctx.repo().load::<Account>(tx.account)?;
        account.balance -= tx.amount;
        ctx.repo().store(tx.account, &account)?;
        note(&j, format!("compensate:Credited#{}", tx.account));
        Ok(())
    });

    let j = journal.clone();
    transactions.register::<Debited, _>(move |tx, ctx| {
        let mut account = ctx.repo().load::<Account>(tx.account)?;
        if account.balance < tx.amount {
            return Err(KestrelError::rejected("insufficient funds"));
        }
        account.balance -= tx.amount;
        ctx.repo().store(tx.account, &account)?;
        note(&j, format!("apply:Debited#{}", tx.account));
        Ok(())
    });

    let j = journal.clone();
    transactions.register_compensation::<Debited, _>(move |tx, ctx| {
        let mut account = ctx.repo().load::<Account>(tx.account)?;
        account.balance += tx.amount;
        ctx.repo().store(tx.account, &account)?;
        note(&j, format!("compensate:Debited#{}", tx.account));
        Ok(())
    });

    let j = journal.clone();
    transactions.register::<Poisoned, _>(move |tx, _| {
        note(&j, format!("apply:Poisoned#{}", tx.account));
        Ok(())
    });

    let j = journal.clone();
    transactions.register_compensation::<Poisoned, _>(move |tx, _| {
        note(&j, format!("compensate:Poisoned#{}", tx.account));
        Err(KestrelError::rejected("cannot undo poison"))
    });

    transactions.register::<Faulty, _>(|_, _| Err(KestrelError::rejected("faulty")));

    Bank {
        commands,
        transactions,
        journal,
    }
}

/// In-memory repository that also records begin/commit/rollback calls
#[derive(Debug, Default)]
pub struct SpyRepository {
    pub inner: InMemoryRepository,
    pub calls: Vec<&'static str>,
    /// Make `rollback` panic after recording the call
    pub broken_rollback: bool,
}

impl Repository for SpyRepository {
    fn get_record(&self, key: &RecordKey) -> Option<&Value> {
        self.inner.get_record(key)
    }

    fn record_ids(&self, kind: &str) -> Vec<i64> {
        self.inner.record_ids(kind)
    }
}

impl WriteableRepository for SpyRepository {
    fn store_record(&mut self, key: RecordKey, value: Value) -> Option<Value> {
        self.inner.store_record(key, value)
    }

    fn remove_record(&mut self, key: &RecordKey) -> Option<Value> {
        self.inner.remove_record(key)
    }
}

impl DomainRepository for SpyRepository {
    fn begin(&mut self) {
        self.calls.push("begin");
        self.inner.begin();
    }

    fn commit(&mut self) {
        self.calls.push("commit");
        self.inner.commit();
    }

    fn rollback(&mut self) {
        self.calls.push("rollback");
        if self.broken_rollback {
            panic!("rollback journal lost");
        }
        self.inner.rollback();
    }

    fn data(&self) -> RepositoryData {
        self.inner.data()
    }

    fn restore(&mut self, data: RepositoryData) {
        self.inner.restore(data);
    }
}

/// Executor wired to the bank domain
pub struct Harness {
    pub executor: TransactionExecutor,
    pub repo: SpyRepository,
    pub bank: Bank,
    pub ids: SequenceIdGenerator,
    pub failover: FailoverStrategy,
}

impl Harness {
    pub fn new(failover: FailoverStrategy) -> Self {
        Self {
            executor: TransactionExecutor::new(),
            repo: SpyRepository::default(),
            bank: bank(),
            ids: SequenceIdGenerator::new(),
            failover,
        }
    }

    /// Store accounts directly, bypassing the executor
    pub fn with_accounts(mut self, balances: &[(i64, i64)]) -> Self {
        for (id, balance) in balances {
            self.repo
                .inner
                .store(*id, &Account { balance: *balance })
                .unwrap();
            self.ids.seed(Account::KIND, *id);
        }
        self
    }

    pub fn run(&mut self, unit: &mut WorkUnit) {
        self.executor.execute_commands(
            unit,
            WorkflowContext {
                repository: &mut self.repo,
                commands: &self.bank.commands,
                transactions: &self.bank.transactions,
                id_generator: &mut self.ids,
                failover: self.failover,
            },
        );
    }

    pub fn balance(&self, id: i64) -> Option<i64> {
        self.repo
            .inner
            .get::<Account>(id)
            .unwrap()
            .map(|account| account.balance)
    }

    pub fn journal(&self) -> Vec<String> {
        self.bank.journal.lock().unwrap().clone()
    }

    pub fn clear(&mut self) {
        self.bank.journal.lock().unwrap().clear();
        self.repo.calls.clear();
    }
}
