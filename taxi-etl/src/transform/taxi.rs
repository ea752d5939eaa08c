use chrono::Timelike;
use tracing::debug;

use crate::error::{ErrorKind, EtlResult};
use crate::transform::parse_timestamp;
use crate::types::{Batch, Cell};
use crate::{bail, etl_error};

/// Raw trip column holding the trip start.
pub const TRIP_START_COLUMN: &str = "trip_start_timestamp";

/// Added column holding the trip start floored to the hour, used to join hourly weather.
pub const WEATHER_HOUR_COLUMN: &str = "datetime_for_weather";

/// Raw trip columns that are not carried into the fact table.
pub const DROPPED_TAXI_COLUMNS: [&str; 4] = [
    "pickup_census_tract",
    "dropoff_census_tract",
    "pickup_centroid_location",
    "dropoff_centroid_location",
];

/// Community area columns, renamed because they already hold area identifiers.
const RENAMED_TAXI_COLUMNS: [(&str, &str); 2] = [
    ("pickup_community_area", "pickup_community_area_id"),
    ("dropoff_community_area", "dropoff_community_area_id"),
];

/// Cleans raw trips into the shape of the fact table, before enrichment.
///
/// Drops the location detail columns, then every row with a null, renames the community area
/// columns, parses the trip start and appends [`WEATHER_HOUR_COLUMN`].
///
/// Fails with [`ErrorKind::EmptyInput`] when there are no trips, or none survive cleaning.
pub fn transform_taxi(mut trips: Batch) -> EtlResult<Batch> {
    if trips.is_empty() {
        bail!(
            ErrorKind::EmptyInput,
            "Raw taxi file holds no trips",
            "the record array is empty"
        );
    }
    let raw_rows = trips.len();

    trips.drop_columns(&DROPPED_TAXI_COLUMNS);
    trips.retain_rows(|row| row.values().iter().all(|cell| !cell.is_null()));
    if trips.is_empty() {
        bail!(
            ErrorKind::EmptyInput,
            "No taxi trip is complete",
            format!("all {raw_rows} trips have at least one null field")
        );
    }

    for (from, to) in RENAMED_TAXI_COLUMNS {
        trips.rename_column(from, to)?;
    }

    trips.map_column(TRIP_START_COLUMN, |row, cell| match cell {
        Cell::Timestamp(timestamp) => Ok(Cell::Timestamp(*timestamp)),
        Cell::String(value) => parse_timestamp(value).map(Cell::Timestamp).ok_or_else(|| {
            etl_error!(
                ErrorKind::ConversionError,
                "Invalid trip start timestamp",
                format!("row {row}: `{value}` is not a timestamp")
            )
        }),
        other => Err(etl_error!(
            ErrorKind::ConversionError,
            "Invalid trip start timestamp",
            format!("row {row}: `{}` is not a timestamp", other.render())
        )),
    })?;

    let weather_hours: Vec<Cell> = trips
        .column_values(TRIP_START_COLUMN)?
        .map(|cell| match cell.as_timestamp().and_then(floor_to_hour) {
            Some(hour) => Cell::Timestamp(hour),
            None => Cell::Null,
        })
        .collect();
    trips.add_column(WEATHER_HOUR_COLUMN, weather_hours)?;

    debug!(
        raw_rows,
        rows = trips.len(),
        dropped = raw_rows - trips.len(),
        "transformed taxi trips"
    );

    Ok(trips)
}

fn floor_to_hour(timestamp: chrono::NaiveDateTime) -> Option<chrono::NaiveDateTime> {
    timestamp
        .with_minute(0)?
        .with_second(0)?
        .with_nanosecond(0)
}
