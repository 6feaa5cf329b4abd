//! quicklint configuration core
//!
//! Configuration discovery, caching, and live change detection for the
//! quicklint JavaScript linter. The loader resolves the effective
//! `quick-lint-js.config` for each source file by ancestor search, shares
//! one parsed document per canonical configuration path, and watches every
//! filesystem location that contributed to a resolution so that later
//! changes are reported through [`ConfigLoader::refresh`].

pub mod cache;
pub mod canonical;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod loader;
pub mod result;
pub mod watcher;

pub use cache::{ConfigCache, ConfigDoc, ContentHash};
pub use canonical::CanonicalPathBuf;
pub use config::{Configuration, GlobalFlags, Globals};
pub use error::{IoError, IoErrorKind, WatchIoError};
pub use filesystem::{ConfigFilesystem, FakeFilesystem, FileKind, RealFilesystem};
pub use loader::{CONFIG_FILE_NAME, ConfigChange, ConfigLoader, FileToLint};
pub use result::Result;
pub use watcher::{
    LocationKind, NotifyBackend, NullBackend, WatchBackend, WatchRegistry, WatchedLocation,
};

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quicklint=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
