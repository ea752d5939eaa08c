use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::store::ObjectStore;

/// In-memory object store for tests and dry runs.
///
/// Clones share the same objects, so a test can hand one clone to the pipeline and inspect the
/// other afterwards. Everything is lost when the last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored object, keyed by object key.
    pub async fn objects(&self) -> BTreeMap<String, Bytes> {
        self.objects.read().await.clone()
    }

    /// Returns the content of an object as UTF-8 text, if present.
    pub async fn text(&self, key: &str) -> Option<String> {
        let objects = self.objects.read().await;
        objects
            .get(key)
            .map(|data| String::from_utf8_lossy(data).into_owned())
    }
}

impl ObjectStore for MemoryStore {
    fn name() -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> EtlResult<Bytes> {
        let objects = self.objects.read().await;
        match objects.get(key) {
            Some(data) => Ok(data.clone()),
            None => bail!(
                ErrorKind::StorageObjectNotFound,
                "Object not found",
                format!("no object at `{key}`")
            ),
        }
    }

    async fn put(&self, key: &str, data: Bytes) -> EtlResult<()> {
        debug!(key, bytes = data.len(), "putting object");
        self.objects.write().await.insert(key.to_owned(), data);

        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> EtlResult<()> {
        let mut objects = self.objects.write().await;
        let Some(data) = objects.get(from).cloned() else {
            bail!(
                ErrorKind::StorageObjectNotFound,
                "Object not found",
                format!("cannot copy missing object `{from}` to `{to}`")
            );
        };
        objects.insert(to.to_owned(), data);

        Ok(())
    }

    async fn delete(&self, key: &str) -> EtlResult<()> {
        self.objects.write().await.remove(key);

        Ok(())
    }

    async fn list(&self, prefix: &str) -> EtlResult<Vec<String>> {
        let objects = self.objects.read().await;
        let keys = objects
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        Ok(keys)
    }

    async fn exists(&self, key: &str) -> EtlResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_returns_only_prefixed_keys_in_order() {
        let store = MemoryStore::new();
        for key in ["raw/b.json", "raw/a.json", "rawx/c.json", "other/d.json"] {
            store.put(key, Bytes::from_static(b"{}")).await.unwrap();
        }

        let keys = store.list("raw/").await.unwrap();

        assert_eq!(keys, vec!["raw/a.json", "raw/b.json"]);
    }

    #[tokio::test]
    async fn missing_object_is_reported_as_not_found() {
        let store = MemoryStore::new();

        let err = store.get("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageObjectNotFound);

        let err = store.copy("nope", "elsewhere").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageObjectNotFound);
    }

    #[tokio::test]
    async fn delete_of_missing_object_succeeds() {
        let store = MemoryStore::new();

        assert!(store.delete("never/there").await.is_ok());
    }
}
