//! Configuration discovery, caching, and change detection
//!
//! The loader resolves the effective configuration for each source file by
//! walking ancestor directories for `quick-lint-js.config`, and keeps a
//! watch over every filesystem location that contributed to the decision,
//! including directories where the answer was "nothing here", since that
//! absence is revocable. [`ConfigLoader::refresh`] re-resolves every watch
//! and reports only outcomes that actually differ from what was last
//! reported.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{ConfigCache, ConfigDoc, ContentHash};
use crate::canonical::CanonicalPathBuf;
use crate::error::{IoError, IoErrorKind, WatchIoError};
use crate::filesystem::{ConfigFilesystem, FileKind};
use crate::result::Result;
use crate::watcher::{WatchBackend, WatchRegistry, WatchedLocation};

/// The discovered configuration file name. Ancestor search stops at the
/// filesystem root.
pub const CONFIG_FILE_NAME: &str = "quick-lint-js.config";

/// A source file to resolve configuration for.
#[derive(Debug, Clone, Default)]
pub struct FileToLint {
    /// Path as given by the user; may be relative and may not exist.
    pub path: PathBuf,
    /// Explicit configuration file, replacing ancestor search.
    pub config_file: Option<PathBuf>,
    /// Where ancestor search begins instead of `path` (used when `path` is
    /// stdin or a file that does not exist on disk).
    pub path_for_config_search: Option<PathBuf>,
    pub is_stdin: bool,
}

impl FileToLint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// A configuration change reported by [`ConfigLoader::refresh`].
#[derive(Debug, Clone)]
pub struct ConfigChange {
    /// The input path of the watch that changed, exactly as registered.
    pub watched_path: PathBuf,
    /// The token supplied at registration.
    pub token: u64,
    /// The now-effective configuration, or `None` if the watch no longer
    /// resolves to one.
    pub config_file: Option<Arc<ConfigDoc>>,
    /// The failure that replaced (or accompanies) the resolution, if any.
    pub error: Option<IoError>,
}

#[derive(Debug, Clone)]
enum WatchKind {
    /// Ancestor search for the configuration governing a source file.
    ForFile {
        config_search_path: Option<PathBuf>,
    },
    /// A specific configuration file, no ancestor search.
    ForConfigFile,
}

/// Result of resolving one watch at one point in time.
#[derive(Debug, Clone)]
enum WatchOutcome {
    Config {
        doc: Arc<ConfigDoc>,
        digest: ContentHash,
    },
    NoConfig,
    Error(IoError),
}

impl WatchOutcome {
    /// Whether two outcomes are semantically the same resolution. Same doc
    /// handle with the same content digest and the same error state means
    /// nothing to report.
    fn matches(&self, other: &WatchOutcome) -> bool {
        match (self, other) {
            (
                WatchOutcome::Config { doc, digest },
                WatchOutcome::Config {
                    doc: other_doc,
                    digest: other_digest,
                },
            ) => Arc::ptr_eq(doc, other_doc) && digest == other_digest,
            (WatchOutcome::NoConfig, WatchOutcome::NoConfig) => true,
            (WatchOutcome::Error(err), WatchOutcome::Error(other_err)) => err == other_err,
            _ => false,
        }
    }

    fn doc(&self) -> Option<Arc<ConfigDoc>> {
        match self {
            WatchOutcome::Config { doc, .. } => Some(doc.clone()),
            _ => None,
        }
    }

    fn to_result(&self) -> Result<Option<Arc<ConfigDoc>>> {
        match self {
            WatchOutcome::Config { doc, .. } => Ok(Some(doc.clone())),
            WatchOutcome::NoConfig => Ok(None),
            WatchOutcome::Error(err) => Err(err.clone()),
        }
    }
}

/// Whether a found configuration file may be served from the cache as-is or
/// must be re-read and diffed against the cached digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    CacheFirst,
    Probe,
}

struct Watch {
    kind: WatchKind,
    input_path: PathBuf,
    token: u64,
    last: WatchOutcome,
    locations: HashSet<WatchedLocation>,
}

/// The change-detecting configuration loader.
///
/// Single-threaded: the caller thread is the only mutator, and `refresh` is
/// its sole synchronization point with filesystem events. Platform watcher
/// handles are released when the loader is dropped.
pub struct ConfigLoader {
    fs: Arc<dyn ConfigFilesystem>,
    backend: Box<dyn WatchBackend>,
    registry: WatchRegistry,
    cache: ConfigCache,
    watches: Vec<Watch>,
}

impl ConfigLoader {
    pub fn new(fs: Arc<dyn ConfigFilesystem>, backend: Box<dyn WatchBackend>) -> Self {
        Self {
            fs,
            backend,
            registry: WatchRegistry::new(),
            cache: ConfigCache::new(),
            watches: Vec::new(),
        }
    }

    /// Resolve and load configuration for `path`, watching every location
    /// the resolution depended on.
    ///
    /// Returns `Ok(None)` when no configuration file governs `path`. An
    /// `Err` still registers the watch: a later filesystem change that
    /// repairs the failure is reported by [`ConfigLoader::refresh`].
    pub fn watch_and_load_for_file(
        &mut self,
        path: impl Into<PathBuf>,
        token: u64,
    ) -> Result<Option<Arc<ConfigDoc>>> {
        self.register_watch(
            WatchKind::ForFile {
                config_search_path: None,
            },
            path.into(),
            token,
        )
        .to_result()
    }

    /// Watch a specific configuration file without ancestor search.
    ///
    /// Every directory between the filesystem root and the file is watched
    /// too, so directory swaps and symlink retargets are observed. As with
    /// [`ConfigLoader::watch_and_load_for_file`], failure still registers
    /// the watch.
    pub fn watch_and_load_config_file(
        &mut self,
        path: impl Into<PathBuf>,
        token: u64,
    ) -> Result<Arc<ConfigDoc>> {
        let path = path.into();
        match self.register_watch(WatchKind::ForConfigFile, path.clone(), token) {
            WatchOutcome::Config { doc, .. } => Ok(doc),
            WatchOutcome::Error(err) => Err(err),
            // Direct resolution never reports the no-config outcome.
            WatchOutcome::NoConfig => Err(IoError::new(path, IoErrorKind::NotFound)),
        }
    }

    /// Register a watch for a [`FileToLint`], honoring its explicit config
    /// file and search-path override.
    pub fn watch_and_load(
        &mut self,
        file: &FileToLint,
        token: u64,
    ) -> Result<Option<Arc<ConfigDoc>>> {
        if let Some(config_file) = &file.config_file {
            return self
                .watch_and_load_config_file(config_file.clone(), token)
                .map(Some);
        }
        if file.is_stdin && file.path_for_config_search.is_none() {
            return Ok(None);
        }
        self.register_watch(
            WatchKind::ForFile {
                config_search_path: file.path_for_config_search.clone(),
            },
            file.path.clone(),
            token,
        )
        .to_result()
    }

    /// One-shot resolution without installing any watches.
    pub fn load_for_file(&mut self, file: &FileToLint) -> Result<Option<Arc<ConfigDoc>>> {
        // Locations are collected but discarded: nothing gets watched.
        let mut locations = HashSet::new();
        if let Some(config_file) = &file.config_file {
            return self
                .resolve_config_file(config_file, LoadMode::CacheFirst, &mut locations)
                .to_result();
        }
        if file.is_stdin && file.path_for_config_search.is_none() {
            return Ok(None);
        }
        let base = file
            .path_for_config_search
            .as_deref()
            .unwrap_or(&file.path);
        self.resolve_for_file(base, LoadMode::CacheFirst, &mut locations)
            .to_result()
    }

    /// Release every watch registered for `path` (the original input path).
    pub fn unwatch_file(&mut self, path: &Path) {
        let (removed, kept): (Vec<Watch>, Vec<Watch>) = std::mem::take(&mut self.watches)
            .into_iter()
            .partition(|watch| watch.input_path == path);
        self.watches = kept;
        for watch in removed {
            for location in &watch.locations {
                self.registry.release(self.backend.as_mut(), location);
            }
        }
    }

    /// Release everything. Subsequent filesystem changes produce no events,
    /// and cached documents are dropped with the watches.
    pub fn unwatch_all_files(&mut self) {
        self.watches.clear();
        self.registry.clear(self.backend.as_mut());
        self.cache.clear();
    }

    /// Re-evaluate every watch and report the resolutions that changed, in
    /// watch-registration order.
    ///
    /// Calling this twice with no interleaving filesystem change yields an
    /// empty second list; a write that leaves bytes identical reports
    /// nothing.
    pub fn refresh(&mut self) -> Vec<ConfigChange> {
        if self.backend.poll_changed() {
            tracing::debug!("filesystem changed since last refresh");
        }
        self.backend.retry_failed_watches();

        let mut changes = Vec::new();
        for index in 0..self.watches.len() {
            let (kind, input_path, token, old_locations) = {
                let watch = &self.watches[index];
                (
                    watch.kind.clone(),
                    watch.input_path.clone(),
                    watch.token,
                    watch.locations.clone(),
                )
            };

            let mut locations = HashSet::new();
            let outcome = self.resolve(&kind, &input_path, LoadMode::Probe, &mut locations);
            self.registry
                .sync(self.backend.as_mut(), &old_locations, &locations);

            let watch = &mut self.watches[index];
            watch.locations = locations;
            if !outcome.matches(&watch.last) {
                changes.push(ConfigChange {
                    watched_path: watch.input_path.clone(),
                    token,
                    config_file: outcome.doc(),
                    error: match &outcome {
                        WatchOutcome::Error(err) => Some(err.clone()),
                        _ => None,
                    },
                });
                watch.last = outcome;
            }
        }
        changes
    }

    /// Drain queued watch-registration errors (see
    /// [`WatchBackend::take_watch_errors`]).
    pub fn take_watch_errors(&mut self) -> Vec<WatchIoError> {
        self.backend.take_watch_errors()
    }

    /// Drain pending filesystem events, reporting whether anything changed
    /// since the last drain. Purely advisory: `refresh` re-resolves
    /// unconditionally.
    pub fn poll_filesystem_changed(&mut self) -> bool {
        self.backend.poll_changed()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    fn register_watch(&mut self, kind: WatchKind, input_path: PathBuf, token: u64) -> WatchOutcome {
        let mut locations = HashSet::new();
        let outcome = self.resolve(&kind, &input_path, LoadMode::CacheFirst, &mut locations);
        self.registry
            .sync(self.backend.as_mut(), &HashSet::new(), &locations);
        self.watches.push(Watch {
            kind,
            input_path,
            token,
            last: outcome.clone(),
            locations,
        });
        outcome
    }

    fn resolve(
        &mut self,
        kind: &WatchKind,
        input_path: &Path,
        mode: LoadMode,
        locations: &mut HashSet<WatchedLocation>,
    ) -> WatchOutcome {
        match kind {
            WatchKind::ForFile { config_search_path } => {
                let base = config_search_path.as_deref().unwrap_or(input_path);
                self.resolve_for_file(base, mode, locations)
            }
            WatchKind::ForConfigFile => self.resolve_config_file(input_path, mode, locations),
        }
    }

    /// Ancestor search: walk upward from the directory of `base`, probing
    /// each level for [`CONFIG_FILE_NAME`].
    fn resolve_for_file(
        &mut self,
        base: &Path,
        mode: LoadMode,
        locations: &mut HashSet<WatchedLocation>,
    ) -> WatchOutcome {
        let canonical_base = match self.fs.canonicalize(base) {
            Ok(path) => path,
            Err(err) => {
                watch_canonicalizable_prefix(&err, locations);
                return WatchOutcome::Error(err);
            }
        };
        let start_dir = match canonical_base.parent() {
            Some(parent) => parent,
            None => canonical_base.clone(),
        };
        watch_ancestors(&start_dir, locations);

        let mut dir = start_dir;
        loop {
            let candidate = dir.as_path().join(CONFIG_FILE_NAME);
            match self.fs.stat(&candidate) {
                Ok(FileKind::File) => {
                    return self.found_config_file(&candidate, mode, locations);
                }
                Ok(FileKind::Directory) => {
                    let canonical = self
                        .fs
                        .canonicalize(&candidate)
                        .map(CanonicalPathBuf::into_path_buf)
                        .unwrap_or(candidate);
                    return WatchOutcome::Error(IoError::new(canonical, IoErrorKind::IsADirectory));
                }
                Ok(FileKind::Missing | FileKind::Other) => {}
                Err(err) => return WatchOutcome::Error(err),
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        WatchOutcome::NoConfig
    }

    /// Direct mode: the caller named the configuration file itself.
    fn resolve_config_file(
        &mut self,
        input_path: &Path,
        mode: LoadMode,
        locations: &mut HashSet<WatchedLocation>,
    ) -> WatchOutcome {
        let canonical = match self.fs.canonicalize(input_path) {
            Ok(path) => path,
            Err(err) => {
                watch_canonicalizable_prefix(&err, locations);
                return WatchOutcome::Error(err);
            }
        };
        if let Some(parent) = canonical.parent() {
            watch_ancestors(&parent, locations);
        }
        match self.fs.stat(&canonical) {
            Ok(FileKind::File) => self.found_config_file(canonical.as_path(), mode, locations),
            Ok(FileKind::Directory) => WatchOutcome::Error(IoError::new(
                canonical.into_path_buf(),
                IoErrorKind::IsADirectory,
            )),
            Ok(FileKind::Missing | FileKind::Other) => WatchOutcome::Error(IoError::new(
                canonical.into_path_buf(),
                IoErrorKind::NotFound,
            )),
            Err(err) => WatchOutcome::Error(err),
        }
    }

    /// A candidate path stat'ed as a regular file: canonicalize it (it may
    /// be a symlink), watch it, and load it through the cache.
    fn found_config_file(
        &mut self,
        candidate: &Path,
        mode: LoadMode,
        locations: &mut HashSet<WatchedLocation>,
    ) -> WatchOutcome {
        let canonical = match self.fs.canonicalize(candidate) {
            Ok(path) => path,
            Err(err) => {
                watch_canonicalizable_prefix(&err, locations);
                return WatchOutcome::Error(err);
            }
        };
        // The symlink target's directory chain matters too: moving the
        // target out from under the link must be observed.
        if let Some(parent) = canonical.parent() {
            watch_ancestors(&parent, locations);
        }
        locations.insert(WatchedLocation::file(canonical.clone()));

        match mode {
            LoadMode::CacheFirst => {
                let doc = self.cache.get_or_load(self.fs.as_ref(), &canonical);
                match doc.load_error() {
                    Some(err) => WatchOutcome::Error(err),
                    None => {
                        tracing::debug!("found config: {}", canonical.display());
                        let digest = doc.content_hash().unwrap_or_default();
                        WatchOutcome::Config { doc, digest }
                    }
                }
            }
            LoadMode::Probe => match self.fs.read_file(&canonical) {
                Ok(bytes) => {
                    let digest = ContentHash::from_bytes(&bytes);
                    let doc = match self.cache.get(&canonical) {
                        Some(doc) => {
                            if doc.content_hash() != Some(digest) {
                                doc.reload(&bytes);
                            }
                            doc
                        }
                        None => self.cache.store(canonical, &bytes),
                    };
                    WatchOutcome::Config { doc, digest }
                }
                Err(err) => WatchOutcome::Error(err),
            },
        }
    }
}

/// Watch `dir` and every ancestor up to the filesystem root. A change to
/// any of them (rename, permission flip, symlink retarget) can invalidate a
/// resolution that passed through `dir`.
fn watch_ancestors(dir: &CanonicalPathBuf, locations: &mut HashSet<WatchedLocation>) {
    let mut current = Some(dir.clone());
    while let Some(dir) = current {
        current = dir.parent();
        locations.insert(WatchedLocation::directory(dir));
    }
}

/// Even a failed canonicalization names the prefix that did resolve; watch
/// it so that repairing the failure (chmod, mkdir) produces an event.
fn watch_canonicalizable_prefix(err: &IoError, locations: &mut HashSet<WatchedLocation>) {
    if let Some(prefix) = err
        .canonicalizing_path
        .as_ref()
        .and_then(|path| path.parent())
    {
        watch_ancestors(
            &CanonicalPathBuf::from_canonicalized(prefix),
            locations,
        );
    }
}
