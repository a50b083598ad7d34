//! Advisory lock file that keeps sync runs exclusive across processes.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::Result;

const LOCK_SUFFIX: &str = "sync-lock";

/// Exclusive lock held for the duration of one run.
///
/// Released when dropped, or by the OS if the process dies.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    /// Lock file used for the store at `db_path`
    pub fn path_for(db_path: &Path) -> PathBuf {
        let mut name = db_path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(LOCK_SUFFIX);
        db_path.with_file_name(name)
    }

    /// Take the lock without blocking; `None` if another holder has it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                file,
            })),
            Err(error) if is_contended(&error) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release {}: {}", self.path.display(), error);
        }
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == fs2::lock_contended_error().kind() || error.kind() == io::ErrorKind::WouldBlock
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_path_sits_next_to_store() {
        let path = RunLock::path_for(Path::new("/var/lib/fieldsync/fieldsync.db"));
        assert_eq!(path, PathBuf::from("/var/lib/fieldsync/fieldsync.db.sync-lock"));
    }

    #[test]
    fn test_second_holder_is_refused() {
        let temp = tempdir().unwrap();
        let path = RunLock::path_for(&temp.path().join("fieldsync.db"));

        let first = RunLock::try_acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(RunLock::try_acquire(&path).unwrap().is_none());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let path = RunLock::path_for(&temp.path().join("fieldsync.db"));

        drop(RunLock::try_acquire(&path).unwrap());
        assert!(RunLock::try_acquire(&path).unwrap().is_some());
    }
}
