//! File-based locking for serializing writers on a shared resource.
//!
//! Uses one `.lock` file per key under a caller-provided directory, so two
//! tasks (or processes) populating the same cache entry take turns instead of
//! racing on the same output file.

use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use crate::error::{LockError, LockResult};

/// An exclusive per-key lock backed by `flock`.
///
/// The lock is released when the `KeyLock` is dropped.
pub struct KeyLock {
    _file: nix::fcntl::Flock<File>,
    path: PathBuf,
}

impl KeyLock {
    fn lock_path(dir: &Path, key: &str) -> LockResult<PathBuf> {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|err| {
                LockError::Io {
                    path: dir.to_path_buf(),
                    source: err,
                }
            })?;
        }

        // Keys may contain characters that are not valid in file names.
        let sanitize = |s: &str| {
            s.chars()
                .map(|c| {
                    if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect::<String>()
        };

        Ok(dir.join(format!("{}.lock", sanitize(key))))
    }

    /// Acquire an exclusive lock for `key`, blocking until it is available.
    pub fn acquire(dir: &Path, key: &str) -> LockResult<Self> {
        let lock_path = Self::lock_path(dir, key)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|err| {
                LockError::Io {
                    path: lock_path.clone(),
                    source: err,
                }
            })?;

        let file = nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusive).map_err(
            |(_, err)| LockError::AcquireFailed(format!("{}: {}", lock_path.display(), err)),
        )?;

        Ok(KeyLock {
            path: lock_path,
            _file: file,
        })
    }

    /// Try to acquire an exclusive lock for `key` without blocking.
    ///
    /// Returns `None` if the lock is already held.
    pub fn try_acquire(dir: &Path, key: &str) -> LockResult<Option<Self>> {
        let lock_path = Self::lock_path(dir, key)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|err| {
                LockError::Io {
                    path: lock_path.clone(),
                    source: err,
                }
            })?;

        match nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusiveNonblock) {
            Ok(file) => {
                Ok(Some(KeyLock {
                    path: lock_path,
                    _file: file,
                }))
            }
            Err((_, err)) => {
                if matches!(err, nix::errno::Errno::EWOULDBLOCK) {
                    return Ok(None);
                }
                Err(LockError::AcquireFailed(format!(
                    "{}: {}",
                    lock_path.display(),
                    err
                )))
            }
        }
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
