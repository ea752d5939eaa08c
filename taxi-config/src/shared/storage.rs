use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Object storage backing raw inputs, dimension tables and outputs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StorageConfig {
    /// A directory tree on the local filesystem; object keys are paths relative to `root`.
    Local { root: PathBuf },
    /// A process-local store that is discarded on exit. Useful for dry runs.
    Memory,
}

impl StorageConfig {
    /// Validates storage settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let StorageConfig::Local { root } = self
            && root.as_os_str().is_empty()
        {
            return Err(ValidationError::invalid(
                "storage.root",
                "must not be empty",
            ));
        }

        Ok(())
    }
}
