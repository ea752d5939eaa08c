use std::borrow::Cow;

use chrono::NaiveDateTime;

/// Format used when a timestamp is written to an output file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single typed value of a [`crate::types::TableRow`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Timestamp(NaiveDateTime),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the value as a string slice when it is textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Timestamp(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text a dimension table stores for this value.
    ///
    /// Nulls have no natural key. Non-textual values use their output rendering, so `1` and
    /// `"1"` map to the same dimension entry.
    pub fn natural_key(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::Null => None,
            Cell::String(value) => Some(Cow::Borrowed(value)),
            other => Some(other.render()),
        }
    }

    /// Renders the value for an output file. Nulls render as an empty string.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Cell::Null => Cow::Borrowed(""),
            Cell::Bool(value) => Cow::Owned(value.to_string()),
            Cell::I64(value) => Cow::Owned(value.to_string()),
            Cell::F64(value) => Cow::Owned(value.to_string()),
            Cell::String(value) => Cow::Borrowed(value),
            Cell::Timestamp(value) => Cow::Owned(value.format(TIMESTAMP_FORMAT).to_string()),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Cell::String(value.to_string()), Cell::I64)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::Timestamp(value)
    }
}
