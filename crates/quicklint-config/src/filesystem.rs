//! Filesystem abstraction for configuration loading
//!
//! The loader only needs four operations: canonicalize, read, stat, and the
//! derived directory/file predicates. Keeping them behind a trait lets the
//! test suite swap in an in-memory filesystem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;

use crate::canonical::{self, CanonicalPathBuf};
use crate::error::{IoError, IoErrorKind};
use crate::result::Result;

/// What a path refers to. `Missing` is a value, not an error: the resolver
/// treats absence as a decision to revisit, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Other,
    Missing,
}

/// Minimal filesystem surface used by the configuration loader.
pub trait ConfigFilesystem {
    /// Resolve `.`, `..`, and symlinks into a [`CanonicalPathBuf`].
    ///
    /// Trailing missing components are appended lexically rather than
    /// failing; only hard errors (permissions, loops) are reported.
    fn canonicalize(&self, path: &Path) -> Result<CanonicalPathBuf>;

    /// Read a file's bytes. Empty files are valid.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Classify `path`, following symlinks.
    fn stat(&self, path: &Path) -> Result<FileKind>;

    fn is_directory(&self, path: &Path) -> bool {
        matches!(self.stat(path), Ok(FileKind::Directory))
    }

    fn is_regular_file(&self, path: &Path) -> bool {
        matches!(self.stat(path), Ok(FileKind::File))
    }
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFilesystem;

impl RealFilesystem {
    pub fn new() -> Self {
        Self
    }
}

impl ConfigFilesystem for RealFilesystem {
    fn canonicalize(&self, path: &Path) -> Result<CanonicalPathBuf> {
        canonical::canonicalize(path)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|err| IoError::from_io(path, &err))
    }

    fn stat(&self, path: &Path) -> Result<FileKind> {
        match std::fs::metadata(path) {
            Ok(metadata) => {
                let file_type = metadata.file_type();
                if file_type.is_file() {
                    Ok(FileKind::File)
                } else if file_type.is_dir() {
                    Ok(FileKind::Directory)
                } else {
                    Ok(FileKind::Other)
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(FileKind::Missing),
            Err(err) => Err(IoError::from_io(path, &err)),
        }
    }
}

#[derive(Debug, Clone)]
enum FakeEntry {
    File(Vec<u8>),
    Directory,
}

/// In-memory filesystem for tests.
///
/// Paths are plain absolute paths under [`FakeFilesystem::root`]; there are
/// no symlinks, so canonicalization is lexical.
#[derive(Debug, Default)]
pub struct FakeFilesystem {
    entries: Mutex<BTreeMap<PathBuf, FakeEntry>>,
}

impl FakeFilesystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.entries
            .lock()
            .insert(fs.root(), FakeEntry::Directory);
        fs
    }

    pub fn root(&self) -> PathBuf {
        PathBuf::from("/")
    }

    /// Absolute path for a root-relative spelling, e.g. `rooted("dir/a.js")`.
    pub fn rooted(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Create or overwrite a file, creating parent directories implicitly.
    pub fn create_file(&self, path: impl Into<PathBuf>, contents: impl AsRef<[u8]>) {
        let path = canonical::normalize_lexically(&path.into());
        let mut entries = self.entries.lock();
        let mut parent = path.parent();
        while let Some(dir) = parent {
            entries.insert(dir.to_path_buf(), FakeEntry::Directory);
            parent = dir.parent();
        }
        entries.insert(path, FakeEntry::File(contents.as_ref().to_vec()));
    }

    pub fn create_directory(&self, path: impl Into<PathBuf>) {
        let path = canonical::normalize_lexically(&path.into());
        let mut entries = self.entries.lock();
        let mut parent = path.parent();
        while let Some(dir) = parent {
            entries.insert(dir.to_path_buf(), FakeEntry::Directory);
            parent = dir.parent();
        }
        entries.insert(path, FakeEntry::Directory);
    }

    pub fn remove_file(&self, path: &Path) {
        let path = canonical::normalize_lexically(path);
        self.entries.lock().remove(&path);
    }
}

impl ConfigFilesystem for FakeFilesystem {
    fn canonicalize(&self, path: &Path) -> Result<CanonicalPathBuf> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        };
        Ok(CanonicalPathBuf::from_canonicalized(
            canonical::normalize_lexically(&absolute),
        ))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let path = canonical::normalize_lexically(path);
        match self.entries.lock().get(&path) {
            Some(FakeEntry::File(contents)) => Ok(contents.clone()),
            Some(FakeEntry::Directory) => Err(IoError::new(path, IoErrorKind::IsADirectory)),
            None => Err(IoError::new(path, IoErrorKind::NotFound)),
        }
    }

    fn stat(&self, path: &Path) -> Result<FileKind> {
        let path = canonical::normalize_lexically(path);
        match self.entries.lock().get(&path) {
            Some(FakeEntry::File(_)) => Ok(FileKind::File),
            Some(FakeEntry::Directory) => Ok(FileKind::Directory),
            None => Ok(FileKind::Missing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_filesystem_tracks_files_and_parents() {
        let fs = FakeFilesystem::new();
        fs.create_file(fs.rooted("dir/subdir/hello.js"), "code");

        assert_eq!(fs.stat(&fs.rooted("dir")).unwrap(), FileKind::Directory);
        assert_eq!(
            fs.stat(&fs.rooted("dir/subdir/hello.js")).unwrap(),
            FileKind::File
        );
        assert_eq!(fs.stat(&fs.rooted("absent")).unwrap(), FileKind::Missing);
        assert_eq!(
            fs.read_file(&fs.rooted("dir/subdir/hello.js")).unwrap(),
            b"code"
        );
    }

    #[test]
    fn fake_filesystem_remove() {
        let fs = FakeFilesystem::new();
        fs.create_file(fs.rooted("a.js"), "");
        fs.remove_file(&fs.rooted("a.js"));
        assert_eq!(fs.stat(&fs.rooted("a.js")).unwrap(), FileKind::Missing);
    }

    #[test]
    fn real_filesystem_stat_kinds() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("file"), "x").unwrap();

        let fs = RealFilesystem::new();
        assert_eq!(fs.stat(&temp.path().join("file")).unwrap(), FileKind::File);
        assert_eq!(fs.stat(temp.path()).unwrap(), FileKind::Directory);
        assert_eq!(
            fs.stat(&temp.path().join("missing")).unwrap(),
            FileKind::Missing
        );
        assert!(fs.is_directory(temp.path()));
        assert!(fs.is_regular_file(&temp.path().join("file")));
    }
}
