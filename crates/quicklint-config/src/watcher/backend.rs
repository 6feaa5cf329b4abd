//! Watcher backends: the platform watcher and a no-op stand-in.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crossbeam_channel::Receiver;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{IoErrorKind, WatchIoError};

/// Where filesystem observation actually happens.
///
/// Registration failures never surface inline; they queue until
/// [`WatchBackend::take_watch_errors`] drains them, so a caller still gets
/// the best-effort current configuration.
pub trait WatchBackend {
    /// Observe entry creates/deletes/renames in `path`, and changes to the
    /// directory itself. Idempotent per path.
    fn watch_directory(&mut self, path: &Path);

    /// Observe content, permission, rename, and delete changes of `path`.
    /// Idempotent per path.
    fn watch_file(&mut self, path: &Path);

    /// Stop observing a single location.
    fn unwatch(&mut self, path: &Path);

    /// Drop every observation.
    fn unwatch_all(&mut self);

    /// Drain queued events. Returns whether anything changed since the last
    /// drain; per-event detail is not portable and not exposed.
    fn poll_changed(&mut self) -> bool;

    /// Retry registrations that failed earlier (e.g. the directory did not
    /// exist yet). Called at the start of every refresh.
    fn retry_failed_watches(&mut self) {}

    /// Return and clear pending registration errors.
    fn take_watch_errors(&mut self) -> Vec<WatchIoError>;
}

/// Production backend on top of `notify`'s recommended platform watcher
/// (inotify on Linux, kqueue/FSEvents on the BSDs and macOS, directory
/// change notifications on Windows).
///
/// The watcher's own event-pump thread delivers into a channel; the caller
/// thread drains it during refresh. Dropping the backend releases every
/// platform handle and joins the pump thread.
pub struct NotifyBackend {
    watcher: Option<RecommendedWatcher>,
    event_rx: Receiver<()>,
    error_rx: Receiver<WatchIoError>,
    pending_errors: Vec<WatchIoError>,
    watched: HashSet<PathBuf>,
    failed: HashSet<PathBuf>,
}

impl NotifyBackend {
    pub fn new() -> Self {
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<()>();
        let (error_tx, error_rx) = crossbeam_channel::unbounded::<WatchIoError>();

        let mut pending_errors = Vec::new();
        let watcher = match notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            if let Err(err) = &result {
                let _ = error_tx.send(runtime_watch_error(err));
            }
            // Either way the filesystem view may have shifted.
            let _ = event_tx.send(());
        }) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!("failed to initialize filesystem watcher: {err}");
                pending_errors.push(WatchIoError::new(PathBuf::new(), notify_error_kind(&err)));
                None
            }
        };

        Self {
            watcher,
            event_rx,
            error_rx,
            pending_errors,
            watched: HashSet::new(),
            failed: HashSet::new(),
        }
    }

    fn watch_path(&mut self, path: &Path) {
        let Some(watcher) = self.watcher.as_mut() else {
            return;
        };
        if !self.watched.insert(path.to_path_buf()) {
            return;
        }
        if let Err(err) = watcher.watch(path, RecursiveMode::NonRecursive) {
            tracing::debug!("failed to watch {}: {err}", path.display());
            self.failed.insert(path.to_path_buf());
            self.pending_errors
                .push(WatchIoError::new(path, notify_error_kind(&err)));
        }
    }
}

impl Default for NotifyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchBackend for NotifyBackend {
    fn watch_directory(&mut self, path: &Path) {
        self.watch_path(path);
    }

    fn watch_file(&mut self, path: &Path) {
        self.watch_path(path);
    }

    fn unwatch(&mut self, path: &Path) {
        if !self.watched.remove(path) {
            return;
        }
        self.failed.remove(path);
        if let Some(watcher) = self.watcher.as_mut() {
            if let Err(err) = watcher.unwatch(path) {
                // The location may already be gone; nothing to release.
                tracing::debug!("failed to unwatch {}: {err}", path.display());
            }
        }
    }

    fn unwatch_all(&mut self) {
        let paths: Vec<PathBuf> = self.watched.drain().collect();
        self.failed.clear();
        if let Some(watcher) = self.watcher.as_mut() {
            for path in paths {
                if let Err(err) = watcher.unwatch(&path) {
                    tracing::debug!("failed to unwatch {}: {err}", path.display());
                }
            }
        }
    }

    fn poll_changed(&mut self) -> bool {
        let mut changed = false;
        while self.event_rx.try_recv().is_ok() {
            changed = true;
        }
        changed
    }

    fn retry_failed_watches(&mut self) {
        if self.failed.is_empty() {
            return;
        }
        let Some(watcher) = self.watcher.as_mut() else {
            return;
        };
        let mut still_failing = HashSet::new();
        for path in self.failed.drain() {
            if watcher.watch(&path, RecursiveMode::NonRecursive).is_err() {
                still_failing.insert(path);
            } else {
                tracing::debug!("watch established after retry: {}", path.display());
            }
        }
        self.failed = still_failing;
    }

    fn take_watch_errors(&mut self) -> Vec<WatchIoError> {
        while let Ok(err) = self.error_rx.try_recv() {
            self.pending_errors.push(err);
        }
        std::mem::take(&mut self.pending_errors)
    }
}

/// No-op backend for loaders that never watch (one-shot lints) and for
/// tests that drive refresh directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        Self
    }
}

impl WatchBackend for NullBackend {
    fn watch_directory(&mut self, _path: &Path) {}

    fn watch_file(&mut self, _path: &Path) {}

    fn unwatch(&mut self, _path: &Path) {}

    fn unwatch_all(&mut self) {}

    fn poll_changed(&mut self) -> bool {
        false
    }

    fn take_watch_errors(&mut self) -> Vec<WatchIoError> {
        Vec::new()
    }
}

fn notify_error_kind(err: &notify::Error) -> IoErrorKind {
    match &err.kind {
        notify::ErrorKind::Io(io_err) => IoErrorKind::from_io(io_err),
        notify::ErrorKind::PathNotFound | notify::ErrorKind::WatchNotFound => IoErrorKind::NotFound,
        notify::ErrorKind::MaxFilesWatch => IoErrorKind::NoSpace,
        _ => IoErrorKind::Other(0),
    }
}

fn runtime_watch_error(err: &notify::Error) -> WatchIoError {
    let path = err.paths.first().cloned().unwrap_or_default();
    WatchIoError::new(path, notify_error_kind(err))
}
