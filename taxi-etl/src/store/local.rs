use std::io;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::store::ObjectStore;
use crate::{bail, etl_error};

/// Prefix of the temporary files written before an atomic rename.
const TEMP_FILE_PREFIX: &str = ".tmp-";

/// Object store backed by a directory on the local filesystem.
///
/// Object keys map to relative paths under the root directory. Writes go to a temporary file in
/// the destination directory that is then renamed into place, so readers never observe a
/// half-written object.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to a path under the root, rejecting keys that would escape it.
    fn path_for(&self, key: &str) -> EtlResult<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            bail!(
                ErrorKind::StorageError,
                "Invalid object key",
                format!("`{key}` is not a relative path of plain segments")
            );
        }

        Ok(self.root.join(relative))
    }

    async fn collect_keys(&self, prefix: &str) -> EtlResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(directory) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&directory).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(storage_error(err, &directory.to_string_lossy())),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|err| storage_error(err, &directory.to_string_lossy()))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|err| storage_error(err, &path.to_string_lossy()))?;

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                if entry.file_name().to_string_lossy().starts_with(TEMP_FILE_PREFIX) {
                    continue;
                }

                if let Some(key) = key_for(&self.root, &path)
                    && key.starts_with(prefix)
                {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

impl ObjectStore for LocalStore {
    fn name() -> &'static str {
        "local"
    }

    async fn get(&self, key: &str) -> EtlResult<Bytes> {
        let path = self.path_for(key)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|err| storage_error(err, key))?;

        Ok(Bytes::from(data))
    }

    async fn put(&self, key: &str, data: Bytes) -> EtlResult<()> {
        let path = self.path_for(key)?;
        let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
            bail!(
                ErrorKind::StorageError,
                "Invalid object key",
                format!("`{key}` has no file name")
            );
        };

        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| storage_error(err, key))?;

        let temp_path = parent.join(format!(
            "{TEMP_FILE_PREFIX}{}-{}",
            std::process::id(),
            file_name.to_string_lossy()
        ));
        tokio::fs::write(&temp_path, &data)
            .await
            .map_err(|err| storage_error(err, key))?;
        if let Err(err) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(storage_error(err, key));
        }

        debug!(key, bytes = data.len(), "wrote object");

        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> EtlResult<()> {
        let data = self.get(from).await?;
        self.put(to, data).await
    }

    async fn delete(&self, key: &str) -> EtlResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_error(err, key)),
        }
    }

    async fn list(&self, prefix: &str) -> EtlResult<Vec<String>> {
        self.collect_keys(prefix).await
    }

    async fn exists(&self, key: &str) -> EtlResult<bool> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|err| storage_error(err, key))
    }
}

/// Rebuilds a `/`-separated key from a path under `root`.
fn key_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();

    Some(segments.join("/"))
}

fn storage_error(err: io::Error, key: &str) -> EtlError {
    if err.kind() == io::ErrorKind::NotFound {
        return etl_error!(
            ErrorKind::StorageObjectNotFound,
            "Object not found",
            format!("no object at `{key}`"),
            source: err
        );
    }

    etl_error!(
        ErrorKind::StorageError,
        "Local storage operation failed",
        format!("operation on `{key}` failed: {err}"),
        source: err
    )
}
