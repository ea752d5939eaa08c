use serde::Deserialize;
use tracing::debug;

use crate::error::{ErrorKind, EtlResult};
use crate::transform::parse_timestamp;
use crate::types::{Batch, Cell, TableRow};
use crate::{bail, etl_error};

/// Output column holding the hour a weather row describes.
pub const WEATHER_DATETIME_COLUMN: &str = "datetime";

const WEATHER_COLUMNS: [&str; 5] = [
    WEATHER_DATETIME_COLUMN,
    "temperature",
    "wind_speed",
    "rain",
    "precipitation",
];

#[derive(Debug, Deserialize)]
struct WeatherDocument {
    hourly: HourlyWeather,
}

#[derive(Debug, Deserialize)]
struct HourlyWeather {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
    rain: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
}

/// Turns an hourly weather response into one row per hour.
///
/// Fails with [`ErrorKind::InvalidData`] if the hourly arrays differ in length and with
/// [`ErrorKind::EmptyInput`] if there are no hours.
pub fn transform_weather(data: &[u8]) -> EtlResult<Batch> {
    let document: WeatherDocument = serde_json::from_slice(data)?;
    let hourly = document.hourly;

    let hours = hourly.time.len();
    let lengths = [
        ("temperature_2m", hourly.temperature_2m.len()),
        ("wind_speed_10m", hourly.wind_speed_10m.len()),
        ("rain", hourly.rain.len()),
        ("precipitation", hourly.precipitation.len()),
    ];
    if let Some((name, len)) = lengths.iter().find(|(_, len)| *len != hours) {
        bail!(
            ErrorKind::InvalidData,
            "Hourly weather arrays differ in length",
            format!("`time` has {hours} entries, `{name}` has {len}")
        );
    }
    if hours == 0 {
        bail!(
            ErrorKind::EmptyInput,
            "Weather response holds no hours",
            "the `hourly.time` array is empty"
        );
    }

    let mut batch = Batch::new(WEATHER_COLUMNS.iter().map(|c| (*c).to_owned()).collect());
    let measurements = hourly
        .temperature_2m
        .into_iter()
        .zip(hourly.wind_speed_10m)
        .zip(hourly.rain)
        .zip(hourly.precipitation);
    for (row, (time, (((temperature, wind_speed), rain), precipitation))) in
        hourly.time.iter().zip(measurements).enumerate()
    {
        let datetime = parse_timestamp(time).ok_or_else(|| {
            etl_error!(
                ErrorKind::ConversionError,
                "Invalid weather timestamp",
                format!("hour {row}: `{time}` is not a timestamp")
            )
        })?;

        batch.push_row(TableRow::new(vec![
            Cell::Timestamp(datetime),
            measurement(temperature),
            measurement(wind_speed),
            measurement(rain),
            measurement(precipitation),
        ]))?;
    }

    debug!(rows = batch.len(), "transformed weather");

    Ok(batch)
}

fn measurement(value: Option<f64>) -> Cell {
    value.map_or(Cell::Null, Cell::F64)
}
