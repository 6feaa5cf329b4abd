//! Configuration document cache
//!
//! One [`ConfigDoc`] exists per canonical configuration path for the
//! lifetime of the loader. Reloads replace the parsed configuration in
//! place, so every watch pointing at a path keeps observing the same
//! handle across content changes.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::canonical::CanonicalPathBuf;
use crate::config::Configuration;
use crate::error::IoError;
use crate::filesystem::ConfigFilesystem;

/// Content digest: cheap equality check for "did the bytes change".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash {
    hash: u64,
    size: usize,
}

impl ContentHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        use std::collections::hash_map::DefaultHasher;

        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);

        Self {
            hash: hasher.finish(),
            size: bytes.len(),
        }
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for ContentHash {
    fn default() -> Self {
        Self::from_bytes(&[])
    }
}

#[derive(Debug)]
struct DocState {
    config: Arc<Configuration>,
    digest: Option<ContentHash>,
    load_error: Option<IoError>,
}

/// A loaded configuration record.
///
/// Identity matters: watches compare `Arc` handles, and the handle survives
/// reloads and even read failures, so a repaired file diffs as exactly one
/// change.
#[derive(Debug)]
pub struct ConfigDoc {
    canonical_path: CanonicalPathBuf,
    state: RwLock<DocState>,
}

impl ConfigDoc {
    fn loaded(canonical_path: CanonicalPathBuf, bytes: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            canonical_path,
            state: RwLock::new(DocState {
                config: Arc::new(Configuration::from_json(bytes)),
                digest: Some(ContentHash::from_bytes(bytes)),
                load_error: None,
            }),
        })
    }

    fn failed(canonical_path: CanonicalPathBuf, error: IoError) -> Arc<Self> {
        Arc::new(Self {
            canonical_path,
            state: RwLock::new(DocState {
                config: Arc::new(Configuration::default()),
                digest: None,
                load_error: Some(error),
            }),
        })
    }

    /// Canonical path of the configuration file this document was read from.
    pub fn config_path(&self) -> &Path {
        self.canonical_path.as_path()
    }

    /// Current parsed configuration. Invalid JSON parses to the default
    /// configuration, so this is always usable.
    pub fn config(&self) -> Arc<Configuration> {
        self.state.read().config.clone()
    }

    /// Digest of the last successfully read content.
    pub fn content_hash(&self) -> Option<ContentHash> {
        self.state.read().digest
    }

    /// The read failure from the last load attempt, if any.
    pub fn load_error(&self) -> Option<IoError> {
        self.state.read().load_error.clone()
    }

    /// Replace the configuration in place from fresh bytes.
    pub(crate) fn reload(&self, bytes: &[u8]) {
        tracing::debug!("reloading configuration: {}", self.canonical_path.display());
        let mut state = self.state.write();
        state.config = Arc::new(Configuration::from_json(bytes));
        state.digest = Some(ContentHash::from_bytes(bytes));
        state.load_error = None;
    }
}

/// Map canonical configuration path → shared [`ConfigDoc`], with load-once
/// semantics per path.
#[derive(Debug, Default)]
pub struct ConfigCache {
    docs: HashMap<CanonicalPathBuf, Arc<ConfigDoc>>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &CanonicalPathBuf) -> Option<Arc<ConfigDoc>> {
        self.docs.get(path).cloned()
    }

    /// Return the cached document, loading it on first use.
    ///
    /// A read failure still materializes a document (default configuration,
    /// `load_error` set) so that the path keeps a stable identity and a
    /// later successful read repairs it in place.
    pub fn get_or_load(
        &mut self,
        fs: &dyn ConfigFilesystem,
        path: &CanonicalPathBuf,
    ) -> Arc<ConfigDoc> {
        if let Some(doc) = self.docs.get(path) {
            return doc.clone();
        }
        let doc = match fs.read_file(path) {
            Ok(bytes) => {
                tracing::debug!("loaded configuration: {}", path.display());
                ConfigDoc::loaded(path.clone(), &bytes)
            }
            Err(err) => ConfigDoc::failed(path.clone(), err),
        };
        self.docs.insert(path.clone(), doc.clone());
        doc
    }

    /// Insert a document from bytes that were already read.
    pub(crate) fn store(&mut self, path: CanonicalPathBuf, bytes: &[u8]) -> Arc<ConfigDoc> {
        let doc = ConfigDoc::loaded(path.clone(), bytes);
        self.docs.insert(path, doc.clone());
        doc
    }

    pub fn clear(&mut self) {
        self.docs.clear();
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
