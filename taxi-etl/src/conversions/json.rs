use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Batch, Cell, TableRow};

/// Decodes a JSON array of objects into a [`Batch`].
///
/// Columns are the union of the object keys in first-seen order. A key missing from an object
/// becomes [`Cell::Null`], and nested arrays or objects are kept as their JSON text.
pub fn decode_records(data: &[u8]) -> EtlResult<Batch> {
    let document: Value = serde_json::from_slice(data)?;
    let items = match document {
        Value::Array(items) => items,
        other => bail!(
            ErrorKind::InvalidData,
            "Raw records must be a JSON array",
            format!("found a JSON {} at the top level", json_type(&other))
        ),
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(record) => records.push(record),
            other => bail!(
                ErrorKind::InvalidData,
                "Raw record is not a JSON object",
                format!("record {index} is a JSON {}", json_type(&other))
            ),
        }
    }

    records_to_batch(records)
}

fn records_to_batch(records: Vec<Map<String, Value>>) -> EtlResult<Batch> {
    let columns: IndexSet<String> = records
        .iter()
        .flat_map(|record| record.keys().cloned())
        .collect();

    let mut batch = Batch::new(columns.iter().cloned().collect());
    for mut record in records {
        let values = columns
            .iter()
            .map(|column| record.remove(column).map_or(Cell::Null, json_to_cell))
            .collect();
        batch.push_row(TableRow::new(values))?;
    }

    Ok(batch)
}

/// Converts a JSON value into a [`Cell`].
pub fn json_to_cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(value) => Cell::Bool(value),
        Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                Cell::I64(value)
            } else if let Some(value) = number.as_u64() {
                Cell::from(value)
            } else {
                number.as_f64().map_or(Cell::Null, Cell::F64)
            }
        }
        Value::String(value) => Cell::String(value),
        nested @ (Value::Array(_) | Value::Object(_)) => Cell::String(nested.to_string()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
