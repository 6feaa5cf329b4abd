//! Canonical path representation and resolution
//!
//! A canonical path is absolute, symlink-resolved, and compared byte for
//! byte. It is the key for the config cache and the watch registry: two
//! lexically different spellings of the same file canonicalize to equal
//! values.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::ops::Deref;
use std::path::{Component, Path, PathBuf};

use crate::error::{IoError, IoErrorKind};
use crate::result::Result;

/// Refuse to chase symlink chains longer than this. errno ELOOP.
const MAX_SYMLINK_DEPTH: u32 = 40;
const ELOOP: i32 = 40;

/// An absolute, symlink-resolved path.
///
/// Trailing components are allowed to be missing: canonicalization resolves
/// as far as the filesystem reaches and appends the rest after lexical
/// `.`/`..` normalization, so a canonical path for a not-yet-written file is
/// still well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalPathBuf(PathBuf);

impl CanonicalPathBuf {
    /// Wrap a path that is already canonical.
    ///
    /// Callers must only hand in output of a canonicalizer (or a prefix of
    /// one, which is itself canonical).
    pub(crate) fn from_canonicalized(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Parent directory. A parent of a canonical path is canonical.
    pub fn parent(&self) -> Option<CanonicalPathBuf> {
        self.0.parent().map(|p| Self(p.to_path_buf()))
    }
}

impl Deref for CanonicalPathBuf {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for CanonicalPathBuf {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<CanonicalPathBuf> for PathBuf {
    fn from(path: CanonicalPathBuf) -> PathBuf {
        path.0
    }
}

/// Canonicalize against the real filesystem.
///
/// Resolves `.`, `..`, and symlinks component by component. A `NotFound`
/// component switches the remainder of the walk to lexical normalization;
/// any other failure aborts with `canonicalizing_path` naming the canonical
/// prefix joined with the failing component.
pub(crate) fn canonicalize(path: &Path) -> Result<CanonicalPathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|err| IoError::from_io(path, &err))?;
        cwd.join(path)
    };

    let mut resolved = root_of(&absolute);
    let mut queue = VecDeque::new();
    push_components(&mut queue, &absolute);

    let mut missing = false;
    let mut symlink_depth = 0u32;

    while let Some(segment) = queue.pop_front() {
        if segment == ".." {
            // The resolved prefix contains no symlinks, so `..` is a plain
            // lexical pop (and a no-op at the root).
            if resolved.parent().is_some() {
                resolved.pop();
            }
            continue;
        }

        if missing {
            resolved.push(&segment);
            continue;
        }

        let candidate = resolved.join(&segment);
        match std::fs::symlink_metadata(&candidate) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                symlink_depth += 1;
                if symlink_depth > MAX_SYMLINK_DEPTH {
                    return Err(IoError::new(path, IoErrorKind::Other(ELOOP))
                        .with_canonicalizing_path(candidate));
                }
                let target = std::fs::read_link(&candidate).map_err(|err| {
                    IoError::from_io(path, &err).with_canonicalizing_path(candidate.clone())
                })?;
                if target.is_absolute() {
                    resolved = root_of(&target);
                }
                push_components(&mut queue, &target);
            }
            Ok(_) => {
                resolved.push(&segment);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                missing = true;
                resolved.push(&segment);
            }
            Err(err) => {
                return Err(
                    IoError::from_io(path, &err).with_canonicalizing_path(candidate)
                );
            }
        }
    }

    Ok(CanonicalPathBuf(resolved))
}

/// Purely lexical normalization: collapse `.` and `..` without touching the
/// filesystem. Used by the fake filesystem, whose paths have no symlinks.
pub(crate) fn normalize_lexically(path: &Path) -> PathBuf {
    let mut resolved = root_of(path);
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                if resolved.parent().is_some() {
                    resolved.pop();
                }
            }
            Component::Normal(name) => resolved.push(name),
        }
    }
    resolved
}

fn root_of(path: &Path) -> PathBuf {
    let mut root = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => root.push(prefix.as_os_str()),
            Component::RootDir => {
                root.push(std::path::MAIN_SEPARATOR_STR);
                break;
            }
            _ => break,
        }
    }
    root
}

fn push_components(queue: &mut VecDeque<OsString>, path: &Path) {
    for component in path.components().rev() {
        match component {
            Component::Normal(name) => queue.push_front(name.to_os_string()),
            Component::ParentDir => queue.push_front(OsString::from("..")),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
}
