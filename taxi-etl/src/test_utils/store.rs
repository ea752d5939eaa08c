use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tracing::info;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::store::ObjectStore;

/// Object store operation a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Get,
    Put,
    Copy,
    Delete,
    List,
    Exists,
}

#[derive(Debug, Clone)]
struct Fault {
    operation: StoreOperation,
    key_fragment: String,
    kind: ErrorKind,
    remaining: Option<usize>,
}

/// Wraps an [`ObjectStore`] and fails selected operations.
///
/// A fault matches when the operation is the same and the key (either key, for a copy) contains
/// the configured fragment. Clones share their faults.
#[derive(Debug, Clone)]
pub struct FaultInjectingStore<S> {
    inner: S,
    faults: Arc<Mutex<Vec<Fault>>>,
}

impl<S> FaultInjectingStore<S>
where
    S: ObjectStore,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fails every matching operation with [`ErrorKind::StorageError`] until cleared.
    pub fn fail_always(&self, operation: StoreOperation, key_fragment: &str) {
        self.add_fault(operation, key_fragment, ErrorKind::StorageError, None);
    }

    /// Fails the next `times` matching operations with [`ErrorKind::StorageError`].
    pub fn fail_times(&self, operation: StoreOperation, key_fragment: &str, times: usize) {
        self.add_fault(operation, key_fragment, ErrorKind::StorageError, Some(times));
    }

    /// Fails every matching operation with an error of `kind` until cleared.
    pub fn fail_always_with(&self, operation: StoreOperation, key_fragment: &str, kind: ErrorKind) {
        self.add_fault(operation, key_fragment, kind, None);
    }

    pub fn clear(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn add_fault(
        &self,
        operation: StoreOperation,
        key_fragment: &str,
        kind: ErrorKind,
        remaining: Option<usize>,
    ) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Fault {
                operation,
                key_fragment: key_fragment.to_owned(),
                kind,
                remaining,
            });
    }

    fn check(&self, operation: StoreOperation, keys: &[&str]) -> EtlResult<()> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        let matching = faults.iter_mut().find(|fault| {
            fault.operation == operation
                && fault.remaining != Some(0)
                && keys.iter().any(|key| key.contains(&fault.key_fragment))
        });

        let Some(fault) = matching else {
            return Ok(());
        };
        if let Some(remaining) = fault.remaining.as_mut() {
            *remaining -= 1;
        }

        info!(?operation, keys = ?keys, "injecting store fault");

        Err(etl_error!(
            fault.kind,
            "Injected object store failure",
            format!("{operation:?} on {keys:?} failed")
        ))
    }
}

impl<S> ObjectStore for FaultInjectingStore<S>
where
    S: ObjectStore,
{
    fn name() -> &'static str {
        "fault_injecting"
    }

    async fn get(&self, key: &str) -> EtlResult<Bytes> {
        self.check(StoreOperation::Get, &[key])?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> EtlResult<()> {
        self.check(StoreOperation::Put, &[key])?;
        self.inner.put(key, data).await
    }

    async fn copy(&self, from: &str, to: &str) -> EtlResult<()> {
        self.check(StoreOperation::Copy, &[from, to])?;
        self.inner.copy(from, to).await
    }

    async fn delete(&self, key: &str) -> EtlResult<()> {
        self.check(StoreOperation::Delete, &[key])?;
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> EtlResult<Vec<String>> {
        self.check(StoreOperation::List, &[prefix])?;
        self.inner.list(prefix).await
    }

    async fn exists(&self, key: &str) -> EtlResult<bool> {
        self.check(StoreOperation::Exists, &[key])?;
        self.inner.exists(key).await
    }
}
