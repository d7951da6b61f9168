//! Atomic write primitives
//!
//! Uses temp→rename pattern to ensure no partial writes

use std::fs;
use std::path::{Path, PathBuf};

use kestrel_core::Result;

use crate::errors::io_error;

/// Atomically write bytes to a file
///
/// Uses temp file + rename to ensure atomic write
///
/// # Errors
///
/// IO failures creating the directory, writing or renaming.
pub fn atomic_write(target_path: &Path, content: &[u8]) -> Result<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_snapshot_dir", e))?;
    }

    let temp_path = temp_path_for(target_path);
    fs::write(&temp_path, content).map_err(|e| io_error("write_snapshot_temp", e))?;

    if let Err(e) = fs::rename(&temp_path, target_path) {
        fs::remove_file(&temp_path).ok();
        return Err(io_error("rename_snapshot_temp", e));
    }

    Ok(())
}

/// Temp files live next to their target so the rename stays on one filesystem
pub(crate) fn temp_path_for(target_path: &Path) -> PathBuf {
    let mut name = target_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("snapshot-1.json");

        atomic_write(&target, b"hello").unwrap();

        let content = fs::read(&target).unwrap();
        assert_eq!(content, b"hello");
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("subdir").join("snapshot-1.json");

        atomic_write(&target, b"nested").unwrap();

        let content = fs::read(&target).unwrap();
        assert_eq!(content, b"nested");
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("snapshot-1.json");

        atomic_write(&target, b"old").unwrap();
        atomic_write(&target, b"new").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn test_no_tmp_files_after_write() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("snapshot-1.json");

        atomic_write(&target, b"clean").unwrap();

        // Check no .tmp files remain
        let tmp_count = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|s| s.ends_with(".tmp"))
                    .unwrap_or(false)
            })
            .count();

        assert_eq!(tmp_count, 0);
    }

    #[test]
    fn test_temp_path_keeps_full_name() {
        let temp = temp_path_for(Path::new("/data/snapshot-7.json"));
        assert_eq!(temp, PathBuf::from("/data/snapshot-7.json.tmp"));
    }
}
