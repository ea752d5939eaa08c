use tracing::{info, warn};

use crate::conversions::csv::{decode_dimension, encode_dimension};
use crate::dimension::{DimensionEntry, DimensionTable};
use crate::error::{ErrorKind, EtlResult};
use crate::layout::Layout;
use crate::store::ObjectStore;
use crate::{bail, etl_error};

/// Persisted state of one dimension: the current table and the single retained previous version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionSnapshot {
    /// Current table. Empty when the dimension has never been published.
    pub current: DimensionTable,
    /// Previous version, if a backup was ever taken.
    pub previous: Option<DimensionTable>,
}

/// Reads and writes dimension tables at their [`Layout`] keys.
#[derive(Debug, Clone)]
pub struct DimensionStore<S> {
    store: S,
    layout: Layout,
}

impl<S> DimensionStore<S>
where
    S: ObjectStore,
{
    pub fn new(store: S, layout: Layout) -> Self {
        Self { store, layout }
    }

    /// Loads the current and previous versions of `attribute`.
    pub async fn load_snapshot(&self, attribute: &str) -> EtlResult<DimensionSnapshot> {
        let current = self
            .load_table(&self.layout.dimension_key(attribute), attribute)
            .await?
            .unwrap_or_else(|| DimensionTable::new(attribute));
        let previous = self
            .load_table(&self.layout.dimension_backup_key(attribute), attribute)
            .await?;

        Ok(DimensionSnapshot { current, previous })
    }

    /// Loads only the current version of `attribute`.
    pub async fn load_current(&self, attribute: &str) -> EtlResult<DimensionTable> {
        let table = self
            .load_table(&self.layout.dimension_key(attribute), attribute)
            .await?;

        Ok(table.unwrap_or_else(|| DimensionTable::new(attribute)))
    }

    /// Copies the current version of `attribute` into the previous-version slot.
    ///
    /// Returns `false` without writing anything when no current version exists yet.
    pub async fn backup(&self, attribute: &str) -> EtlResult<bool> {
        let current_key = self.layout.dimension_key(attribute);
        let backup_key = self.layout.dimension_backup_key(attribute);

        match self.store.copy(&current_key, &backup_key).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::StorageObjectNotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Overwrites the current version of the table's dimension.
    pub async fn publish(&self, table: &DimensionTable) -> EtlResult<()> {
        let data = encode_dimension(table)?;
        self.store
            .put(&self.layout.dimension_key(table.attribute()), data)
            .await
    }

    /// Restores the previous version of `attribute` as the current one.
    ///
    /// Published fact outputs may reference any pair of the current version, and a pair that
    /// disappears lets a later run hand out its key again for another value. The rollback is
    /// therefore refused with [`ErrorKind::IntegrityError`] when the current version holds pairs
    /// the previous one lacks, or cannot be read at all, unless `force` is set. A forced rollback
    /// logs every withdrawn pair.
    ///
    /// The previous-version slot is left untouched, so a rollback can be repeated.
    pub async fn rollback(&self, attribute: &str, force: bool) -> EtlResult<DimensionTable> {
        let backup_key = self.layout.dimension_backup_key(attribute);
        let Some(previous) = self.load_table(&backup_key, attribute).await? else {
            return Err(etl_error!(
                ErrorKind::StorageObjectNotFound,
                "Dimension has no previous version to roll back to",
                format!("no object at `{backup_key}`")
            ));
        };
        previous.index()?;

        let current_key = self.layout.dimension_key(attribute);
        let withdrawn = match self.load_table(&current_key, attribute).await {
            Ok(Some(current)) => withdrawn_entries(&current, &previous),
            Ok(None) => Vec::new(),
            Err(err) if err.kind() == ErrorKind::StorageError => return Err(err),
            Err(err) => {
                if !force {
                    bail!(
                        ErrorKind::IntegrityError,
                        "Current dimension version cannot be checked before a rollback",
                        format!(
                            "`{current_key}` could not be read, roll back with force to replace it: {err}"
                        )
                    );
                }
                warn!(
                    dimension = attribute,
                    error = %err,
                    "current dimension version is unreadable, forcing rollback"
                );
                Vec::new()
            }
        };

        if !withdrawn.is_empty() {
            let described = describe_entries(&withdrawn);
            if !force {
                bail!(
                    ErrorKind::IntegrityError,
                    "Rollback would withdraw published dimension keys",
                    format!(
                        "dimension `{attribute}` would lose {described}, which fact outputs may reference"
                    )
                );
            }
            warn!(
                dimension = attribute,
                withdrawn = %described,
                "forced rollback withdraws keys that fact outputs may still reference"
            );
        }

        self.store.copy(&backup_key, &current_key).await?;

        warn!(
            dimension = attribute,
            entries = previous.len(),
            "rolled dimension back to its previous version"
        );

        Ok(previous)
    }

    async fn load_table(&self, key: &str, attribute: &str) -> EtlResult<Option<DimensionTable>> {
        let data = match self.store.get(key).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::StorageObjectNotFound => {
                info!(dimension = attribute, key, "dimension object not found");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        decode_dimension(attribute, &data).map(Some)
    }
}

/// Returns the pairs of `current` that `previous` does not hold with the same key.
fn withdrawn_entries(current: &DimensionTable, previous: &DimensionTable) -> Vec<DimensionEntry> {
    current
        .entries()
        .iter()
        .filter(|entry| previous.key_of(&entry.value) != Some(entry.key))
        .cloned()
        .collect()
}

fn describe_entries(entries: &[DimensionEntry]) -> String {
    let pairs: Vec<String> = entries
        .iter()
        .map(|entry| format!("{} -> `{}`", entry.key, entry.value))
        .collect();

    format!("[{}]", pairs.join(", "))
}
