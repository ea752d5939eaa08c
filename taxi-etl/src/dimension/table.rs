use indexmap::IndexMap;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// One persisted pair of a dimension table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionEntry {
    pub key: u64,
    pub value: String,
}

/// A dimension table: natural values mapped to surrogate keys, in insertion order.
///
/// The table keeps entries exactly as they were persisted, so a corrupted object with repeated
/// values or keys can be loaded and then rejected by [`DimensionTable::index`] instead of being
/// silently merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionTable {
    attribute: String,
    entries: Vec<DimensionEntry>,
}

impl DimensionTable {
    /// Creates an empty table for `attribute`.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entries(attribute: impl Into<String>, entries: Vec<DimensionEntry>) -> Self {
        Self {
            attribute: attribute.into(),
            entries,
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Name of the surrogate key column, `<attribute>_id`.
    pub fn key_column(&self) -> String {
        key_column_for(&self.attribute)
    }

    pub fn entries(&self) -> &[DimensionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_key(&self) -> Option<u64> {
        self.entries.iter().map(|entry| entry.key).max()
    }

    /// Returns the key of `value`, scanning entries in order.
    pub fn key_of(&self, value: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.value == value)
            .map(|entry| entry.key)
    }

    /// Builds a value to key index, failing with [`ErrorKind::IntegrityError`] if a natural value
    /// or a surrogate key appears twice.
    pub fn index(&self) -> EtlResult<IndexMap<&str, u64>> {
        let mut index = IndexMap::with_capacity(self.entries.len());
        let mut keys = IndexMap::with_capacity(self.entries.len());

        for entry in &self.entries {
            if let Some(previous) = index.insert(entry.value.as_str(), entry.key) {
                bail!(
                    ErrorKind::IntegrityError,
                    "Dimension table contains a duplicate natural value",
                    format!(
                        "dimension `{}` maps `{}` to both {previous} and {}",
                        self.attribute, entry.value, entry.key
                    )
                );
            }
            if let Some(previous) = keys.insert(entry.key, entry.value.as_str()) {
                bail!(
                    ErrorKind::IntegrityError,
                    "Dimension table contains a duplicate surrogate key",
                    format!(
                        "dimension `{}` uses key {} for both `{previous}` and `{}`",
                        self.attribute, entry.key, entry.value
                    )
                );
            }
        }

        Ok(index)
    }

    /// Appends an entry. Callers are responsible for keeping keys and values unique.
    pub(crate) fn push(&mut self, key: u64, value: String) {
        self.entries.push(DimensionEntry { key, value });
    }
}

/// Returns the surrogate key column name for `attribute`.
pub fn key_column_for(attribute: &str) -> String {
    format!("{attribute}_id")
}
