//! Logging Facility Tests
//!
//! Canonical macros and the events the execution pipeline emits per unit.
//!
//! ## Scenarios Covered
//!
//! 1. Start, end and error macros emit the canonical boundary and error fields
//! 2. A committed unit is bracketed by one start and one end event
//! 3. An aborted unit ends with an error event followed by its recovery events

#![allow(clippy::unwrap_used, clippy::expect_used)]

use kestrel_core::errors::{ExErrorKind, KestrelError};
use kestrel_core::logging_facility::test_capture::init_test_capture;
use kestrel_core::{
    log_op_end, log_op_error, log_op_start, CommandRegistry, FailoverStrategy, InMemoryRepository,
    SequenceIdGenerator, TransactionExecutor, TransactionRegistry, WorkUnit, WorkflowContext,
};
use kestrel_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_APPLIED_LEN, FIELD_COMMANDS_LEN,
    FIELD_COMPONENT, FIELD_DURATION_MS, FIELD_ERR_CODE, FIELD_ERR_KIND, FIELD_ERR_MESSAGE,
    FIELD_FAILOVER, FIELD_MARKED_LEN, FIELD_RESTORE, FIELD_TRANSACTIONS_LEN,
};

fn run(transaction_id: i64, unit: WorkUnit, failover: FailoverStrategy) -> WorkUnit {
    let mut unit = unit;
    let commands = CommandRegistry::new();
    let transactions = TransactionRegistry::new();
    let mut repo = InMemoryRepository::new();
    let mut ids = SequenceIdGenerator::new();
    let mut executor = TransactionExecutor::new();
    assert_eq!(unit.transaction_id(), transaction_id);
    executor.execute_commands(
        &mut unit,
        WorkflowContext {
            repository: &mut repo,
            commands: &commands,
            transactions: &transactions,
            id_generator: &mut ids,
            failover,
        },
    );
    unit
}

#[test]
fn test_log_op_start_and_end_macros() {
    let capture = init_test_capture();

    log_op_start!("macro_boundaries", transaction_id = 101_i64);
    log_op_end!("macro_boundaries", duration_ms = 42, transaction_id = 101_i64);

    assert_eq!(
        capture.lifecycle("macro_boundaries", 101),
        vec![EVENT_START, EVENT_END]
    );
    let end = capture.events_for_unit(101).pop().unwrap();
    assert_eq!(end.field(FIELD_DURATION_MS), Some("42"));
    assert!(end
        .field(FIELD_COMPONENT)
        .unwrap()
        .ends_with("logging_facility_tests"));
}

#[test]
fn test_log_op_error_carries_error_fields() {
    let capture = init_test_capture();

    let err = KestrelError::RecordNotFound {
        kind: "account".to_string(),
        id: 4,
    };
    log_op_error!("macro_error", err, duration_ms = 10, transaction_id = 102_i64);

    let events = capture.events_for_unit(102);
    assert_eq!(events.len(), 1);
    let error = &events[0];
    assert!(error.is("macro_error", EVENT_END_ERROR));
    assert_eq!(error.err_code.as_deref(), Some("ERR_NOT_FOUND"));
    assert_eq!(error.field(FIELD_ERR_KIND), Some("NotFound"));
    assert!(error.field(FIELD_ERR_MESSAGE).unwrap().contains("account#4"));
}

#[test]
fn test_log_op_error_accepts_borrowed_error() {
    let capture = init_test_capture();

    let err = KestrelError::rejected("insufficient funds");
    log_op_error!("macro_error_borrowed", &err, duration_ms = 5, transaction_id = 103_i64);

    let error = capture.events_for_unit(103).pop().expect("error event");
    assert_eq!(error.field(FIELD_ERR_CODE), Some(ExErrorKind::Rejected.code()));
    assert!(error
        .field(FIELD_ERR_MESSAGE)
        .unwrap()
        .contains("insufficient funds"));
}

#[test]
fn test_executor_brackets_committed_unit() {
    // GIVEN an executor with no handlers
    let capture = init_test_capture();
    let transaction_id = 987_654_321;

    // WHEN an empty unit runs in snapshot-rollback mode
    run(
        transaction_id,
        WorkUnit::new(transaction_id),
        FailoverStrategy::SnapshotRollback,
    );

    // THEN exactly one start and one end event carry its transaction id
    assert_eq!(
        capture.lifecycle("execute_commands", transaction_id),
        vec![EVENT_START, EVENT_END]
    );

    // AND they describe the unit
    let events = capture.events_for_unit(transaction_id);
    let start = &events[0];
    assert_eq!(start.field(FIELD_FAILOVER), Some("snapshot_rollback"));
    assert_eq!(start.field(FIELD_RESTORE), Some("false"));
    assert_eq!(start.field(FIELD_COMMANDS_LEN), Some("0"));
    let end = &events[1];
    assert_eq!(end.field(FIELD_TRANSACTIONS_LEN), Some("0"));
    assert_eq!(end.field(FIELD_MARKED_LEN), Some("0"));
}

#[test]
fn test_executor_reports_error_then_recovery_for_aborted_unit() {
    #[derive(Debug)]
    struct Unknown;

    // GIVEN an executor that cannot dispatch the command
    let capture = init_test_capture();
    let transaction_id = 987_654_322;

    // WHEN the unit runs in compensation mode
    let unit = run(
        transaction_id,
        WorkUnit::new(transaction_id).with_command(Unknown),
        FailoverStrategy::Compensation,
    );
    assert!(unit.is_aborted());

    // THEN the unit ends with an error event carrying the dispatch code
    assert_eq!(
        capture.lifecycle("execute_commands", transaction_id),
        vec![EVENT_START, EVENT_END_ERROR]
    );
    let error = capture
        .events_for_unit(transaction_id)
        .into_iter()
        .find(|e| e.is("execute_commands", EVENT_END_ERROR))
        .unwrap();
    assert_eq!(error.err_code.as_deref(), Some("ERR_HANDLER_NOT_FOUND"));
    assert_eq!(error.field(FIELD_APPLIED_LEN), Some("0"));

    // AND compensation reported start and end
    assert_eq!(
        capture.lifecycle("compensate", transaction_id),
        vec![EVENT_START, EVENT_END]
    );
}
