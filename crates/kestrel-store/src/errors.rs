//! Error helpers for kestrel-store
//!
//! Store operations report through the core `KestrelError`.

use std::path::Path;

use kestrel_core::errors::KestrelError;

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> KestrelError {
    KestrelError::io(operation, err)
}

/// Create an invalid snapshot error
pub fn invalid_snapshot(path: &Path, reason: impl Into<String>) -> KestrelError {
    KestrelError::InvalidSnapshot {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::errors::ExErrorKind;

    #[test]
    fn test_io_error_keeps_operation() {
        let err = io_error(
            "read_snapshot",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ExErrorKind::Io);
        assert!(err.to_string().contains("read_snapshot"));
    }

    #[test]
    fn test_invalid_snapshot_names_path() {
        let err = invalid_snapshot(Path::new("/tmp/snapshot-1.json"), "digest mismatch");
        assert_eq!(err.kind(), ExErrorKind::SnapshotCorrupt);
        assert_eq!(
            err.to_string(),
            "Invalid snapshot /tmp/snapshot-1.json: digest mismatch"
        );
    }
}
