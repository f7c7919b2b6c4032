use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::object_store::{ShardStore, StoreError};

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Object store backed by a local directory; keys map to relative paths.
#[derive(Debug, Clone)]
pub struct FsShardStore {
    root: PathBuf,
}

impl FsShardStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(StoreError::Backend(format!(
                "object key '{key}' must be a relative path without '..'"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ShardStore for FsShardStore {
    fn read_object(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(key)?;
        fs::read(&path).map_err(|error| match error.kind() {
            ErrorKind::NotFound => StoreError::NotFound {
                key: key.to_string(),
            },
            _ => StoreError::Backend(format!(
                "failed to read object '{}': {error}",
                path.display()
            )),
        })
    }

    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                StoreError::Backend(format!(
                    "failed to create object directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_nanos())
            .unwrap_or(0);
        let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("tmp.{nanos}.{sequence}"));

        let mut temp_file = File::create(&temp_path).map_err(|error| {
            StoreError::Backend(format!(
                "failed to create temp object '{}': {error}",
                temp_path.display()
            ))
        })?;
        temp_file.write_all(body).map_err(|error| {
            StoreError::Backend(format!(
                "failed to write temp object '{}': {error}",
                temp_path.display()
            ))
        })?;
        temp_file.sync_all().map_err(|error| {
            StoreError::Backend(format!(
                "failed to flush temp object '{}': {error}",
                temp_path.display()
            ))
        })?;

        fs::rename(&temp_path, &path).map_err(|error| {
            let _ = fs::remove_file(&temp_path);
            StoreError::Backend(format!(
                "failed to move object into place at '{}': {error}",
                path.display()
            ))
        })
    }
}
