use std::future::Future;

use bytes::Bytes;

use crate::error::EtlResult;

/// Key-value object storage with flat, `/`-separated keys.
///
/// The contract mirrors what cloud object stores offer and nothing more: there is no atomic
/// rename and no multi-object transaction. Moving an object is a copy followed by a delete, so a
/// crash in between leaves the object at both locations.
///
/// Implementations must report a missing object on [`ObjectStore::get`] and
/// [`ObjectStore::copy`] with [`crate::error::ErrorKind::StorageObjectNotFound`], and every
/// other failure with [`crate::error::ErrorKind::StorageError`].
pub trait ObjectStore: Send + Sync {
    /// Returns the name of the store, used in logs.
    fn name() -> &'static str;

    /// Reads a whole object.
    fn get(&self, key: &str) -> impl Future<Output = EtlResult<Bytes>> + Send;

    /// Creates or overwrites an object.
    fn put(&self, key: &str, data: Bytes) -> impl Future<Output = EtlResult<()>> + Send;

    /// Copies an object, overwriting the destination.
    fn copy(&self, from: &str, to: &str) -> impl Future<Output = EtlResult<()>> + Send;

    /// Deletes an object. Deleting a missing object succeeds.
    fn delete(&self, key: &str) -> impl Future<Output = EtlResult<()>> + Send;

    /// Lists the keys starting with `prefix`, sorted lexicographically.
    fn list(&self, prefix: &str) -> impl Future<Output = EtlResult<Vec<String>>> + Send;

    /// Returns whether an object exists.
    fn exists(&self, key: &str) -> impl Future<Output = EtlResult<bool>> + Send;
}
