use bytes::Bytes;

use crate::dimension::{DimensionEntry, DimensionTable};
use crate::error::{ErrorKind, EtlResult};
use crate::types::Batch;
use crate::{bail, etl_error};

/// Encodes a [`Batch`] as CSV with a header row.
///
/// Cells are written with [`crate::types::Cell::render`], so nulls are empty fields and
/// timestamps use [`crate::types::TIMESTAMP_FORMAT`].
pub fn encode_batch(batch: &Batch) -> EtlResult<Bytes> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record(batch.columns())?;
    for row in batch.rows() {
        writer.write_record(row.values().iter().map(|cell| cell.render().into_owned()))?;
    }

    finish(writer)
}

/// Encodes a dimension table as `<attribute>_id,<attribute>` CSV, keeping entry order.
pub fn encode_dimension(table: &DimensionTable) -> EtlResult<Bytes> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record([table.key_column().as_str(), table.attribute()])?;
    for entry in table.entries() {
        writer.write_record([entry.key.to_string().as_str(), entry.value.as_str()])?;
    }

    finish(writer)
}

/// Decodes a dimension table written by [`encode_dimension`].
///
/// The key and value columns are located by header name, so extra columns and column order do
/// not matter. Duplicates are kept as read and detected by [`DimensionTable::index`].
pub fn decode_dimension(attribute: &str, data: &[u8]) -> EtlResult<DimensionTable> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data);

    let key_column = crate::dimension::key_column_for(attribute);
    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|header| header == name);
    let (Some(key_index), Some(value_index)) = (position(&key_column), position(attribute)) else {
        bail!(
            ErrorKind::MissingColumn,
            "Dimension table is missing its key or value column",
            format!(
                "expected `{key_column}` and `{attribute}`, found [{}]",
                headers.iter().collect::<Vec<_>>().join(", ")
            )
        );
    };

    let mut entries = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let (Some(raw_key), Some(value)) = (record.get(key_index), record.get(value_index)) else {
            bail!(
                ErrorKind::InvalidData,
                "Dimension table row is too short",
                format!("dimension `{attribute}` row {row} has {} fields", record.len())
            );
        };
        let key = raw_key.trim().parse::<u64>().map_err(|err| {
            etl_error!(
                ErrorKind::ConversionError,
                "Invalid surrogate key in dimension table",
                format!("dimension `{attribute}` row {row}: `{raw_key}` is not a valid key"),
                source: err
            )
        })?;

        entries.push(DimensionEntry {
            key,
            value: value.to_owned(),
        });
    }

    Ok(DimensionTable::with_entries(attribute, entries))
}

fn finish(writer: ::csv::Writer<Vec<u8>>) -> EtlResult<Bytes> {
    let data = writer.into_inner().map_err(|err| {
        etl_error!(
            ErrorKind::SerializationError,
            "CSV writer could not be flushed",
            err.error().to_string()
        )
    })?;

    Ok(Bytes::from(data))
}
