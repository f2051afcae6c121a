use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive advisory lock guarding one output archive across processes.
///
/// The lock file sits next to the output (`<output>.lock`) and is held for the
/// lifetime of the value. Dropping the lock releases it but leaves the file in
/// place: unlinking it would let a waiter hold a lock on a detached inode while
/// a newcomer locks a fresh file at the same path.
pub struct OutputLock {
    lock_file: File,
}

impl OutputLock {
    pub fn lock_path(output: &Path) -> PathBuf {
        let mut name = output.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        output.with_file_name(name)
    }

    pub fn acquire(output: &Path) -> Result<Self, CoreError> {
        let file = open_lock_file(&Self::lock_path(output))?;
        file.lock_exclusive()
            .map_err(|e| CoreError::LockFailed(format!("{}: {e}", output.display())))?;
        Ok(Self { lock_file: file })
    }

    pub fn try_acquire(output: &Path) -> Result<Option<Self>, CoreError> {
        let file = open_lock_file(&Self::lock_path(output))?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

fn open_lock_file(lock_path: &Path) -> Result<File, CoreError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}
