use thiserror::Error;

/// Result type alias using KestrelError
pub type Result<T> = std::result::Result<T, KestrelError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, log assertions and diagnostics surfaced on aborted units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Dispatch
    HandlerNotFound,
    PayloadMismatch,

    // Handler faults
    Rejected,
    Panicked,

    // Repository
    NotFound,

    // Recovery
    RecoveryFailed,
    Halted,

    // Integration/IO
    Io,
    Serialization,
    SnapshotMissing,
    SnapshotCorrupt,
    Config,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::HandlerNotFound => "ERR_HANDLER_NOT_FOUND",
            ExErrorKind::PayloadMismatch => "ERR_PAYLOAD_MISMATCH",
            ExErrorKind::Rejected => "ERR_REJECTED",
            ExErrorKind::Panicked => "ERR_PANICKED",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::RecoveryFailed => "ERR_RECOVERY_FAILED",
            ExErrorKind::Halted => "ERR_HALTED",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::SnapshotMissing => "ERR_SNAPSHOT_MISSING",
            ExErrorKind::SnapshotCorrupt => "ERR_SNAPSHOT_CORRUPT",
            ExErrorKind::Config => "ERR_CONFIG",
        }
    }
}

/// Canonical structured error type
///
/// Flattened view of a [`KestrelError`] used by the logging macros: a kind,
/// the operation it surfaced in and a human readable message.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    transaction_id: Option<i64>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            transaction_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add the id of the unit of work the error belongs to
    pub fn with_transaction_id(mut self, transaction_id: i64) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn transaction_id(&self) -> Option<i64> {
        self.transaction_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(transaction_id) = self.transaction_id {
            write!(f, " (transaction_id: {})", transaction_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Error taxonomy for Kestrel operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KestrelError {
    // ===== Dispatch Errors =====
    /// No apply-handler registered for a transaction type
    #[error("No transaction handler registered for {type_name}")]
    UnregisteredTransaction { type_name: String },

    /// No handler registered for a command type
    #[error("No command handler registered for {type_name}")]
    UnregisteredCommand { type_name: String },

    /// A handler was invoked with a payload of a different type than it was registered for
    #[error("Handler for {expected} received a {actual}")]
    PayloadMismatch { expected: String, actual: String },

    // ===== Handler Faults =====
    /// A command or transaction handler refused to proceed
    #[error("Rejected: {reason}")]
    Rejected { reason: String },

    /// A handler panicked while running
    #[error("Handler {op} panicked: {message}")]
    HandlerPanicked { op: String, message: String },

    // ===== Repository Errors =====
    /// Record requested through a typed load does not exist
    #[error("Record not found: {kind}#{id}")]
    RecordNotFound { kind: String, id: i64 },

    // ===== Recovery Errors =====
    /// The executor stopped accepting units after a failed recovery
    #[error("Executor halted after failed recovery: {reason}")]
    ExecutorHalted { reason: String },

    // ===== Integration Errors =====
    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Filesystem error
    #[error("IO error during {op}: {message}")]
    Io { op: String, message: String },

    /// No snapshot is available to load
    #[error("No snapshot available")]
    SnapshotNotFound,

    /// Snapshot exists but cannot be trusted
    #[error("Invalid snapshot {path}: {reason}")]
    InvalidSnapshot { path: String, reason: String },

    /// Configuration could not be loaded
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl KestrelError {
    /// Shorthand for a handler rejection
    pub fn rejected(reason: impl Into<String>) -> Self {
        KestrelError::Rejected {
            reason: reason.into(),
        }
    }

    /// Create an IO error
    pub fn io(op: impl Into<String>, err: std::io::Error) -> Self {
        KestrelError::Io {
            op: op.into(),
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ExErrorKind {
        match self {
            KestrelError::UnregisteredTransaction { .. }
            | KestrelError::UnregisteredCommand { .. } => ExErrorKind::HandlerNotFound,
            KestrelError::PayloadMismatch { .. } => ExErrorKind::PayloadMismatch,
            KestrelError::Rejected { .. } => ExErrorKind::Rejected,
            KestrelError::HandlerPanicked { .. } => ExErrorKind::Panicked,
            KestrelError::RecordNotFound { .. } => ExErrorKind::NotFound,
            KestrelError::ExecutorHalted { .. } => ExErrorKind::Halted,
            KestrelError::Serialization { .. } => ExErrorKind::Serialization,
            KestrelError::Io { .. } => ExErrorKind::Io,
            KestrelError::SnapshotNotFound => ExErrorKind::SnapshotMissing,
            KestrelError::InvalidSnapshot { .. } => ExErrorKind::SnapshotCorrupt,
            KestrelError::Config { .. } => ExErrorKind::Config,
        }
    }
}

/// Conversion from KestrelError to ExError
impl From<KestrelError> for ExError {
    fn from(err: KestrelError) -> Self {
        let ex = ExError::new(err.kind()).with_message(err.to_string());
        match err {
            KestrelError::HandlerPanicked { op, .. } | KestrelError::Io { op, .. } => {
                ex.with_op(op)
            }
            _ => ex,
        }
    }
}

impl From<&KestrelError> for ExError {
    fn from(err: &KestrelError) -> Self {
        err.clone().into()
    }
}

/// Conversion from serde_json::Error to KestrelError
impl From<serde_json::Error> for KestrelError {
    fn from(err: serde_json::Error) -> Self {
        KestrelError::Serialization {
            message: err.to_string(),
        }
    }
}
