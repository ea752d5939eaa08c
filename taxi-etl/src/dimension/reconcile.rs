use indexmap::IndexSet;
use tracing::debug;

use crate::bail;
use crate::dimension::DimensionTable;
use crate::error::{ErrorKind, EtlResult};
use crate::types::Batch;

/// Returns `current` extended with every value of `value_column` it does not know yet.
///
/// New values receive consecutive keys starting at `max(existing keys) + 1`, or at `start_key`
/// when `current` is empty, in the order in which they first appear in `batch`. Existing entries
/// are never changed or reordered, so reconciling the same batch twice yields the same table.
///
/// Fails with [`ErrorKind::IntegrityError`] before anything is computed if `current` holds a
/// natural value or key twice, with [`ErrorKind::MissingColumn`] if the column does not exist
/// and with [`ErrorKind::InvalidData`] if a value is null.
pub fn reconcile(
    batch: &Batch,
    current: &DimensionTable,
    value_column: &str,
    start_key: u64,
) -> EtlResult<DimensionTable> {
    let index = current.index()?;

    let mut distinct = IndexSet::new();
    for (row, cell) in batch.column_values(value_column)?.enumerate() {
        let Some(value) = cell.natural_key() else {
            bail!(
                ErrorKind::InvalidData,
                "Categorical value is null",
                format!("column `{value_column}` is null at row {row}")
            );
        };
        distinct.insert(value);
    }

    let new_values: Vec<_> = distinct
        .into_iter()
        .filter(|value| !index.contains_key(&**value))
        .collect();

    let mut updated = current.clone();
    if new_values.is_empty() {
        return Ok(updated);
    }

    let mut next_key = match current.max_key() {
        Some(max_key) => max_key.checked_add(1),
        None => Some(start_key),
    };
    for value in new_values {
        let Some(key) = next_key else {
            bail!(
                ErrorKind::IntegrityError,
                "Dimension key space is exhausted",
                format!("dimension `{}` cannot assign a key to `{value}`", current.attribute())
            );
        };
        updated.push(key, value.into_owned());
        next_key = key.checked_add(1);
    }

    debug!(
        dimension = current.attribute(),
        new_values = updated.len() - current.len(),
        "reconciled dimension"
    );

    Ok(updated)
}
