use indexmap::IndexMap;
use tracing::debug;

use crate::bail;
use crate::dimension::{DimensionTable, key_column_for};
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Batch, Cell};

/// Replaces each categorical column of `facts` with its surrogate key column.
///
/// For every `(attribute, table)` pair, in map order, the `<attribute>_id` column is appended and
/// the `attribute` column is dropped. The row count and the order of rows never change.
///
/// Fails with [`ErrorKind::UnmatchedDimensionValue`] if a value has no entry in its table, and
/// with [`ErrorKind::IntegrityError`] if `facts` already has a key column or a table is not
/// consistent. `facts` is left untouched in every case.
pub fn enrich(facts: &Batch, tables: &IndexMap<String, DimensionTable>) -> EtlResult<Batch> {
    for attribute in tables.keys() {
        let key_column = key_column_for(attribute);
        if facts.column_index(&key_column).is_some() {
            bail!(
                ErrorKind::IntegrityError,
                "Fact batch already has a dimension key column",
                format!("column `{key_column}` would be overwritten by dimension `{attribute}`")
            );
        }
    }

    let mut enriched = facts.clone();
    for (attribute, table) in tables {
        let index = table.index()?;

        let mut keys = Vec::with_capacity(enriched.len());
        for (row, cell) in enriched.column_values(attribute)?.enumerate() {
            let key = cell
                .natural_key()
                .and_then(|value| index.get(&*value).copied());
            let Some(key) = key else {
                bail!(
                    ErrorKind::UnmatchedDimensionValue,
                    "Fact value has no dimension entry",
                    format!(
                        "dimension `{attribute}`: value `{}` at row {row} is not in the table",
                        if cell.is_null() { "<null>".into() } else { cell.render() }
                    )
                );
            };
            keys.push(Cell::from(key));
        }

        enriched.add_column(key_column_for(attribute), keys)?;
        enriched.drop_columns(&[attribute.as_str()]);
    }

    debug!(
        rows = enriched.len(),
        dimensions = tables.len(),
        "enriched fact batch"
    );

    Ok(enriched)
}
