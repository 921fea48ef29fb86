//! # remotehub-adapter-config-file
//!
//! File-based implementation of the `ConfigStore` port.
//!
//! Each snapshot is serialized as JSON with a four-space indent and sorted
//! keys, written to a sibling `.tmp` file and renamed over the destination.
//! Encoding and IO run on the blocking thread pool.
//!
//! ## Dependency rule
//!
//! Depends on `remotehub-app` (port traits) and `remotehub-domain` only.

use std::io::Write;
use std::path::{Path, PathBuf};

use remotehub_app::ports::ConfigStore;
use remotehub_domain::error::PersistenceError;
use remotehub_domain::snapshot::ConfigSnapshot;
use serde::Serialize;

const INDENT: &[u8] = b"    ";

/// Writes snapshots as JSON files.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileConfigStore;

impl JsonFileConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Serialize `snapshot` the way it is stored on disk.
///
/// # Errors
///
/// Returns [`PersistenceError::Encode`] when serialization fails.
pub fn encode(snapshot: &ConfigSnapshot) -> Result<Vec<u8>, PersistenceError> {
    // round-trip through Value so every object, metadata included, has sorted keys
    let value = serde_json::to_value(snapshot).map_err(PersistenceError::Encode)?;
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer).map_err(PersistenceError::Encode)?;
    buf.push(b'\n');
    Ok(buf)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp = tmp_path(path);
    let mut file = std::fs::File::create(&tmp).map_err(write_err)?;
    file.write_all(contents).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);
    std::fs::rename(&tmp, path).map_err(write_err)
}

impl ConfigStore for JsonFileConfigStore {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn save(&self, path: &Path, snapshot: &ConfigSnapshot) -> Result<(), PersistenceError> {
        let snapshot = snapshot.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), PersistenceError> {
            let contents = encode(&snapshot)?;
            write_atomically(&path, &contents)?;
            tracing::debug!(path = %path.display(), bytes = contents.len(), "hub configuration written");
            Ok(())
        })
        .await
        .map_err(|err| PersistenceError::Task(Box::new(err)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remotehub_domain::snapshot::{ActivityRecord, DeviceRecord};

    fn snapshot() -> ConfigSnapshot {
        ConfigSnapshot::new(
            [ActivityRecord::power_off(), ActivityRecord::new(24_533_120, "Watch TV")],
            [DeviceRecord::new(38_794_003, "Living Room TV").with_commands(["PowerOn"])],
        )
        .with_metadata(serde_json::json!({"zeta": 1, "alpha": 2}))
    }

    #[test]
    fn should_indent_with_four_spaces_and_sort_keys() {
        let text = String::from_utf8(encode(&snapshot()).unwrap()).unwrap();

        assert!(text.starts_with("{\n    \"activities\": {\n        \"-1\": {"));
        let alpha = text.find("\"alpha\"").unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        assert!(alpha < zeta);
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn should_place_tmp_file_next_to_destination() {
        assert_eq!(
            tmp_path(Path::new("/config/hub_den.conf")),
            PathBuf::from("/config/hub_den.conf.tmp")
        );
    }

    #[tokio::test]
    async fn should_write_readable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub_den.conf");
        let store = JsonFileConfigStore::new();
        assert!(!store.exists(&path).await);

        store.save(&path, &snapshot()).await.unwrap();

        assert!(store.exists(&path).await);
        assert!(!tmp_path(&path).exists());
        let parsed: ConfigSnapshot = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed, snapshot());
    }

    #[tokio::test]
    async fn should_replace_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub_den.conf");
        let store = JsonFileConfigStore::new();
        store.save(&path, &snapshot()).await.unwrap();

        let smaller = ConfigSnapshot::new([ActivityRecord::power_off()], []);
        store.save(&path, &smaller).await.unwrap();

        let parsed: ConfigSnapshot = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed, smaller);
    }

    #[tokio::test]
    async fn should_create_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hub_den.conf");

        JsonFileConfigStore::new().save(&path, &snapshot()).await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn should_report_write_failure_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let path = blocker.join("hub_den.conf");

        let err = JsonFileConfigStore::new().save(&path, &snapshot()).await.unwrap_err();

        assert!(matches!(err, PersistenceError::Write { path: p, .. } if p == path));
    }
}
