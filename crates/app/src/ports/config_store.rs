//! Configuration store port: where accepted snapshots are written.

use std::future::Future;
use std::path::Path;

use remotehub_domain::error::PersistenceError;
use remotehub_domain::snapshot::ConfigSnapshot;

/// Persists configuration snapshots, one file per hub.
///
/// Implementations must replace the file as a whole so readers never see a
/// partially written snapshot, and must not block the async runtime.
pub trait ConfigStore: Send + Sync {
    /// Whether a snapshot was already written at `path`.
    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send;

    /// Overwrite `path` with `snapshot`.
    fn save(
        &self,
        path: &Path,
        snapshot: &ConfigSnapshot,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

impl<T: ConfigStore> ConfigStore for std::sync::Arc<T> {
    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send {
        (**self).exists(path)
    }

    fn save(
        &self,
        path: &Path,
        snapshot: &ConfigSnapshot,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send {
        (**self).save(path, snapshot)
    }
}
