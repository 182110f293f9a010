//! Filesystem-backed store for downloaded release archives.
//!
//! Artifacts are stored flat under a single root directory. Writers stream
//! into a `.part` file and only rename it into place on [`ArtifactWriter::commit`],
//! so readers never observe a half-written archive and an aborted download
//! leaves nothing behind. Writers for the same key must be serialized through
//! [`ArtifactStore::lock`]; concurrent cache misses then take turns instead of
//! clobbering each other's output.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use regatta_utils::lock::KeyLock;
use tracing::debug;

use crate::error::{CacheError, Result};

const LOCK_DIR: &str = ".locks";

/// Strips every path separator, then leading/trailing dots, then any
/// remaining `..` runs. The result, joined with the store root, cannot
/// reference a path outside the root.
pub fn sanitize_name(name: &str) -> String {
    let kept: String = name.chars().filter(|c| !matches!(c, '/' | '\\')).collect();
    let mut kept = kept.trim_matches('.').to_string();

    while kept.contains("..") {
        kept = kept.replace("..", "");
    }

    kept
}

pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens (and creates, if needed) an artifact store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| {
            CacheError::Io {
                path: root.clone(),
                action: "create",
                source: err,
            }
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Non-blocking existence probe. Never errors; any failure reads as absent.
    pub fn exists(&self, name: &str) -> bool {
        match self.path_for(name) {
            Ok(path) => path.is_file(),
            Err(_) => false,
        }
    }

    /// Opens a write sink for `name`. Bytes go to a `.part` sibling until the
    /// writer is committed.
    pub fn open_write(&self, name: &str) -> Result<ArtifactWriter> {
        let dest = self.path_for(name)?;
        let part = PathBuf::from(format!("{}.part", dest.display()));

        let file = File::create(&part).map_err(|err| {
            CacheError::Io {
                path: part.clone(),
                action: "create",
                source: err,
            }
        })?;

        Ok(ArtifactWriter {
            inner: Some(BufWriter::new(file)),
            part,
            dest,
        })
    }

    /// Opens a read stream for `name`, or `None` if it was never committed.
    pub fn open_read(&self, name: &str) -> Option<File> {
        let path = self.path_for(name).ok()?;
        File::open(path).ok()
    }

    /// Acquires the per-key writer lock for `name`, blocking until available.
    ///
    /// Callers populating the store must hold this lock across the
    /// exists-check / download / commit sequence.
    pub fn lock(&self, name: &str) -> Result<KeyLock> {
        let key = sanitize_name(name);
        Ok(KeyLock::acquire(&self.root.join(LOCK_DIR), &key)?)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let key = sanitize_name(name);
        if key.is_empty() {
            return Err(CacheError::EmptyKey(name.to_string()));
        }

        Ok(self.root.join(key))
    }
}

/// A write sink that becomes visible to readers only on [`commit`](Self::commit).
///
/// Dropping an uncommitted writer removes the partial file.
pub struct ArtifactWriter {
    inner: Option<BufWriter<File>>,
    part: PathBuf,
    dest: PathBuf,
}

impl ArtifactWriter {
    /// Flushes and closes the underlying file, then renames it into place.
    ///
    /// Only after this returns is the artifact observable through
    /// [`ArtifactStore::exists`] / [`ArtifactStore::open_read`], so any
    /// subsequent hash pass sees a complete file.
    pub fn commit(mut self) -> Result<PathBuf> {
        if let Some(mut writer) = self.inner.take() {
            writer.flush().map_err(|err| {
                CacheError::Io {
                    path: self.part.clone(),
                    action: "flush",
                    source: err,
                }
            })?;
        }

        fs::rename(&self.part, &self.dest).map_err(|err| {
            CacheError::Io {
                path: self.dest.clone(),
                action: "rename into",
                source: err,
            }
        })?;

        debug!("committed artifact {}", self.dest.display());
        Ok(self.dest.clone())
    }
}

impl Write for ArtifactWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::other("artifact writer already committed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            let _ = fs::remove_file(&self.part);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn test_sanitize_strips_traversal() {
        assert_eq!(sanitize_name("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_name("a/b\\c.tgz"), "abc.tgz");
        assert_eq!(sanitize_name("...."), "");
        assert_eq!(sanitize_name("uuid-abc123.tgz"), "uuid-abc123.tgz");
        assert_eq!(sanitize_name("a....b"), "ab");
    }

    #[test]
    fn test_sanitized_path_stays_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        for hostile in ["../../etc/passwd", "..\\..\\boot.ini", "/abs/olute"] {
            let path = store.path_for(hostile).unwrap();
            assert!(path.starts_with(dir.path()));
            assert_eq!(path.components().count(), dir.path().components().count() + 1);
        }
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        assert!(matches!(
            store.open_write("../.."),
            Err(CacheError::EmptyKey(_))
        ));
        assert!(!store.exists("../.."));
    }

    #[test]
    fn test_write_commit_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        assert!(!store.exists("pkg.tgz"));

        let mut writer = store.open_write("pkg.tgz").unwrap();
        writer.write_all(b"archive bytes").unwrap();
        writer.commit().unwrap();

        assert!(store.exists("pkg.tgz"));

        let mut contents = String::new();
        store
            .open_read("pkg.tgz")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "archive bytes");
    }

    #[test]
    fn test_uncommitted_writer_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        {
            let mut writer = store.open_write("partial.tgz").unwrap();
            writer.write_all(b"half an archive").unwrap();
            // dropped without commit
        }

        assert!(!store.exists("partial.tgz"));
        assert!(!dir.path().join("partial.tgz.part").exists());
        assert!(store.open_read("partial.tgz").is_none());
    }

    #[test]
    fn test_reader_never_sees_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        let mut writer = store.open_write("pkg.tgz").unwrap();
        writer.write_all(b"bytes").unwrap();

        // not committed yet
        assert!(!store.exists("pkg.tgz"));
        assert!(store.open_read("pkg.tgz").is_none());

        writer.commit().unwrap();
        assert!(store.exists("pkg.tgz"));
    }

    #[test]
    fn test_per_key_lock_serializes_writers() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        let guard = store.lock("pkg.tgz").unwrap();
        let second = regatta_utils::lock::KeyLock::try_acquire(
            &dir.path().join(LOCK_DIR),
            &sanitize_name("pkg.tgz"),
        )
        .unwrap();
        assert!(second.is_none());

        drop(guard);
        let third = store.lock("pkg.tgz");
        assert!(third.is_ok());
    }
}
