//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.
//! They name the fields the logging macros and the execution pipeline emit;
//! the test capture layer and log assertions read events back through them.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Unit of work identifiers
pub const FIELD_TRANSACTION_ID: &str = "transaction_id";
pub const FIELD_RESTORE: &str = "restore";
pub const FIELD_FAILOVER: &str = "failover";

// Collection sizes
pub const FIELD_COMMANDS_LEN: &str = "commands_len";
pub const FIELD_TRANSACTIONS_LEN: &str = "transactions_len";
pub const FIELD_APPLIED_LEN: &str = "applied_len";
pub const FIELD_MARKED_LEN: &str = "marked_len";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";
pub const FIELD_ERR_MESSAGE: &str = "err.message";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
