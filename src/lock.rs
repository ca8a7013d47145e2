//! The process-wide advisory lock (spec §5).
//!
//! A single lock file at `${cache_dir}/.lock`, acquired non-blockingly:
//! exclusive for write commands (install/update/remove/migrate), shared for
//! read commands (catalog/list). Grounded in the `fs2` crate, the same way
//! the `uv` example in the retrieval pack locks its cache.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LockError {
    #[error("another my-unicorn process is already running")]
    #[diagnostic(
        code(my_unicorn::lock::already_running),
        help("wait for the other invocation to finish, or remove {0} if it is stale")
    )]
    AlreadyRunning(PathBuf),

    #[error("failed to open lock file {path}")]
    #[diagnostic(code(my_unicorn::lock::open_failed))]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub enum LockMode {
    /// Held by write commands: install, update, remove, migrate.
    Exclusive,
    /// Held by read commands: catalog, list.
    Shared,
}

/// An acquired advisory lock. Released when dropped.
pub struct ProcessLock {
    file: File,
    path: PathBuf,
}

impl ProcessLock {
    pub fn acquire(path: &Path, mode: LockMode) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LockError::Open { path: path.to_path_buf(), source })?;

        let acquired = match mode {
            LockMode::Exclusive => file.try_lock_exclusive(),
            LockMode::Shared => file.try_lock_shared(),
        };

        acquired.map_err(|_| LockError::AlreadyRunning(path.to_path_buf()))?;

        Ok(Self { file, path: path.to_path_buf() })
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl std::fmt::Debug for ProcessLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessLock").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_exclusive_lock_fails_while_first_is_held() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".lock");

        let _first = ProcessLock::acquire(&path, LockMode::Exclusive).unwrap();
        let second = ProcessLock::acquire(&path, LockMode::Exclusive);
        assert!(matches!(second, Err(LockError::AlreadyRunning(_))));
    }

    #[test]
    fn shared_locks_can_coexist() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".lock");

        let _first = ProcessLock::acquire(&path, LockMode::Shared).unwrap();
        let second = ProcessLock::acquire(&path, LockMode::Shared);
        assert!(second.is_ok());
    }
}
