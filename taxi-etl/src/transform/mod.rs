//! Reshaping of raw inputs into output tables.

mod taxi;
mod weather;

use chrono::{NaiveDate, NaiveDateTime};

pub use taxi::{
    DROPPED_TAXI_COLUMNS, TRIP_START_COLUMN, WEATHER_HOUR_COLUMN, transform_taxi,
};
pub use weather::{WEATHER_DATETIME_COLUMN, transform_weather};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::Batch;

/// Accepted textual timestamp formats, tried in order.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses an ISO-8601 timestamp without offset, with or without seconds and fraction.
pub(crate) fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value.trim(), format).ok())
}

/// Returns the calendar date of the earliest timestamp in `column`.
///
/// This is the date an output file is named after. Fails with [`ErrorKind::EmptyInput`] for an
/// empty batch and with [`ErrorKind::InvalidData`] if a cell is not a timestamp.
pub fn batch_date(batch: &Batch, column: &str) -> EtlResult<NaiveDate> {
    let mut earliest: Option<NaiveDateTime> = None;
    for (row, cell) in batch.column_values(column)?.enumerate() {
        let Some(timestamp) = cell.as_timestamp() else {
            bail!(
                ErrorKind::InvalidData,
                "Date column holds a non-timestamp value",
                format!("column `{column}` row {row} is `{}`", cell.render())
            );
        };
        earliest = Some(earliest.map_or(timestamp, |current| current.min(timestamp)));
    }

    match earliest {
        Some(timestamp) => Ok(timestamp.date()),
        None => bail!(
            ErrorKind::EmptyInput,
            "Cannot date an empty batch",
            format!("column `{column}` has no values")
        ),
    }
}
