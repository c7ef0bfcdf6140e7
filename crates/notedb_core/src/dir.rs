//! Store directory management.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK          # Advisory lock, one open handle per store
//! ├─ data.mdb      # Engine database
//! └─ lock.mdb      # Engine reader table
//! ```

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const DATA_FILE: &str = "data.mdb";

/// Holds the exclusive lock on a store directory.
///
/// Only one `StoreDir` can exist per directory at a time, within a process
/// or across processes. The engine must not map the same database twice.
#[derive(Debug)]
pub(crate) struct StoreDir {
    path: PathBuf,
    lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the directory is missing and
    /// `create_if_missing` is false, if the path is not a directory, or if
    /// another process holds the lock.
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::open(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::open(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::open(format!(
                "store is locked by another process: {}",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            lock_file,
        })
    }

    /// Returns the store directory.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path as the engine wants it.
    pub(crate) fn engine_path(&self) -> StoreResult<&str> {
        self.path.to_str().ok_or_else(|| {
            StoreError::open(format!("path is not UTF-8: {}", self.path.display()))
        })
    }

    /// Returns the size of the engine's data file, or 0 before it exists.
    pub(crate) fn data_bytes(&self) -> u64 {
        fs::metadata(self.path.join(DATA_FILE)).map_or(0, |m| m.len())
    }
}

impl Drop for StoreDir {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("new_store");

        let dir = StoreDir::open(&store_path, true).unwrap();
        assert!(store_path.is_dir());
        assert_eq!(dir.path(), store_path);
        assert_eq!(dir.data_bytes(), 0);
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let result = StoreDir::open(&temp.path().join("nonexistent"), false);
        assert!(matches!(result, Err(StoreError::Open { .. })));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("locked");

        let _first = StoreDir::open(&store_path, true).unwrap();
        let second = StoreDir::open(&store_path, true);
        assert!(matches!(second, Err(StoreError::Open { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("reopen");

        {
            let _dir = StoreDir::open(&store_path, true).unwrap();
        }
        let _again = StoreDir::open(&store_path, true).unwrap();
    }
}
