//! Reference-counted registry of watched locations.

use std::collections::{HashMap, HashSet};

use crate::canonical::CanonicalPathBuf;

use super::backend::WatchBackend;

/// How a location is observed: a directory for entry changes, or a specific
/// file for content/permission changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    Directory,
    File,
}

/// A filesystem object the backend is instructed to observe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchedLocation {
    pub kind: LocationKind,
    pub path: CanonicalPathBuf,
}

impl WatchedLocation {
    pub fn directory(path: CanonicalPathBuf) -> Self {
        Self {
            kind: LocationKind::Directory,
            path,
        }
    }

    pub fn file(path: CanonicalPathBuf) -> Self {
        Self {
            kind: LocationKind::File,
            path,
        }
    }
}

/// Tracks which locations are currently watched and on behalf of how many
/// watches. A location is registered with the backend exactly once, on the
/// 0→1 transition, and released on the 1→0 transition.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    entries: HashMap<WatchedLocation, usize>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, backend: &mut dyn WatchBackend, location: &WatchedLocation) {
        let count = self.entries.entry(location.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            match location.kind {
                LocationKind::Directory => backend.watch_directory(&location.path),
                LocationKind::File => backend.watch_file(&location.path),
            }
        }
    }

    pub fn release(&mut self, backend: &mut dyn WatchBackend, location: &WatchedLocation) {
        let Some(count) = self.entries.get_mut(location) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        self.entries.remove(location);
        // The same path may still be held under the other kind.
        let path_still_watched = self
            .entries
            .keys()
            .any(|held| held.path == location.path);
        if !path_still_watched {
            backend.unwatch(&location.path);
        }
    }

    /// Move a watch's dependency set from `old` to `new`, acquiring what is
    /// newly needed and releasing what is no longer reachable.
    pub fn sync(
        &mut self,
        backend: &mut dyn WatchBackend,
        old: &HashSet<WatchedLocation>,
        new: &HashSet<WatchedLocation>,
    ) {
        for location in new.difference(old) {
            self.acquire(backend, location);
        }
        for location in old.difference(new) {
            self.release(backend, location);
        }
    }

    pub fn clear(&mut self, backend: &mut dyn WatchBackend) {
        self.entries.clear();
        backend.unwatch_all();
    }

    pub fn location_count(&self) -> usize {
        self.entries.len()
    }
}
