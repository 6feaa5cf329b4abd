//! Error types for configuration loading and filesystem watching

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[cfg(unix)]
const EMFILE: i32 = 24;

/// Classified I/O failure, portable across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoErrorKind {
    NotFound,
    AccessDenied,
    NotADirectory,
    IsADirectory,
    TooManyOpenFiles,
    NoSpace,
    /// Unclassified OS error; carries the raw error code when known.
    Other(i32),
}

impl IoErrorKind {
    /// Classify a `std::io::Error`.
    pub fn from_io(err: &std::io::Error) -> Self {
        #[cfg(unix)]
        if err.raw_os_error() == Some(EMFILE) {
            return Self::TooManyOpenFiles;
        }
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied,
            std::io::ErrorKind::NotADirectory => Self::NotADirectory,
            std::io::ErrorKind::IsADirectory => Self::IsADirectory,
            std::io::ErrorKind::StorageFull => Self::NoSpace,
            _ => Self::Other(err.raw_os_error().unwrap_or(0)),
        }
    }
}

impl fmt::Display for IoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such file or directory"),
            Self::AccessDenied => write!(f, "permission denied"),
            Self::NotADirectory => write!(f, "not a directory"),
            Self::IsADirectory => write!(f, "is a directory"),
            Self::TooManyOpenFiles => write!(f, "too many open files"),
            Self::NoSpace => write!(f, "no space left on device"),
            Self::Other(code) => write!(f, "I/O error (os error {code})"),
        }
    }
}

/// I/O failure during configuration resolution.
///
/// `path` is the path the caller supplied. When canonicalization itself
/// failed, `canonicalizing_path` names the canonical prefix plus the
/// component that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load configuration for '{}': {kind}", .path.display())]
pub struct IoError {
    pub path: PathBuf,
    pub canonicalizing_path: Option<PathBuf>,
    pub kind: IoErrorKind,
}

impl IoError {
    pub fn new(path: impl Into<PathBuf>, kind: IoErrorKind) -> Self {
        Self {
            path: path.into(),
            canonicalizing_path: None,
            kind,
        }
    }

    /// Create an error with path context from a `std::io::Error`.
    pub fn from_io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::new(path, IoErrorKind::from_io(err))
    }

    pub fn with_canonicalizing_path(mut self, canonicalizing_path: impl Into<PathBuf>) -> Self {
        self.canonicalizing_path = Some(canonicalizing_path.into());
        self
    }
}

/// Watch-registration failure queued by the watcher backend.
///
/// These never fail an API call; they are drained out-of-band through
/// `take_watch_errors`. `path` is empty for whole-subsystem init failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to watch '{}': {kind}", .path.display())]
pub struct WatchIoError {
    pub path: PathBuf,
    pub kind: IoErrorKind,
}

impl WatchIoError {
    pub fn new(path: impl Into<PathBuf>, kind: IoErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}
