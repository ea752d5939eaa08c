//! Raw inputs shaped like the source APIs' responses.

use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Value, json};

use crate::dimension::{DimensionEntry, DimensionTable};
use crate::layout::{Layout, RawStatus, SourceKind};
use crate::store::ObjectStore;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn timestamp(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).unwrap()
}

/// A complete trip record as served by the taxi API.
pub fn taxi_trip(trip_id: &str, start: NaiveDateTime, payment_type: &str, company: &str) -> Value {
    json!({
        "trip_id": trip_id,
        "taxi_id": format!("taxi-{trip_id}"),
        "trip_start_timestamp": start.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        "trip_end_timestamp": (start + chrono::Duration::minutes(15)).format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
        "trip_seconds": "900",
        "trip_miles": "2.3",
        "pickup_census_tract": "17031081500",
        "dropoff_census_tract": "17031320100",
        "pickup_community_area": "8",
        "dropoff_community_area": "32",
        "fare": "11.25",
        "tips": "2.0",
        "tolls": "0",
        "extras": "0",
        "trip_total": "13.25",
        "payment_type": payment_type,
        "company": company,
        "pickup_centroid_latitude": "41.899602111",
        "pickup_centroid_longitude": "-87.633308037",
        "pickup_centroid_location": {"type": "Point", "coordinates": [-87.633308037, 41.899602111]},
        "dropoff_centroid_latitude": "41.884987192",
        "dropoff_centroid_longitude": "-87.620992913",
        "dropoff_centroid_location": {"type": "Point", "coordinates": [-87.620992913, 41.884987192]}
    })
}

/// Trips on `day` with the given `(payment_type, company)` pairs, one per hour from midnight.
pub fn taxi_trips(day: NaiveDate, categories: &[(&str, &str)]) -> Vec<Value> {
    categories
        .iter()
        .enumerate()
        .map(|(index, (payment_type, company))| {
            taxi_trip(
                &format!("{day}-{index}"),
                timestamp(day, (index % 24) as u32, 30),
                payment_type,
                company,
            )
        })
        .collect()
}

pub fn taxi_file(trips: &[Value]) -> Bytes {
    Bytes::from(Value::Array(trips.to_vec()).to_string())
}

/// An hourly weather response for `day` with `hours` entries.
pub fn weather_file(day: NaiveDate, hours: u32) -> Bytes {
    let time: Vec<String> = (0..hours)
        .map(|hour| format!("{day}T{hour:02}:00"))
        .collect();
    let series = |base: f64| -> Vec<f64> { (0..hours).map(|h| base + f64::from(h) / 10.0).collect() };

    let document = json!({
        "latitude": 41.85,
        "longitude": -87.65,
        "hourly_units": {"time": "iso8601", "temperature_2m": "°C"},
        "hourly": {
            "time": time,
            "temperature_2m": series(-3.0),
            "wind_speed_10m": series(12.0),
            "rain": series(0.0),
            "precipitation": series(0.0)
        }
    });

    Bytes::from(document.to_string())
}

/// Writes a raw file to the pending area and returns its key.
pub async fn put_pending<S: ObjectStore>(
    store: &S,
    layout: &Layout,
    kind: SourceKind,
    day: NaiveDate,
    data: Bytes,
) -> String {
    let key = layout.raw_key(RawStatus::Pending, kind, &Layout::raw_file_name(kind, day));
    store.put(&key, data).await.unwrap();
    key
}

pub fn dimension(attribute: &str, entries: &[(u64, &str)]) -> DimensionTable {
    DimensionTable::with_entries(
        attribute,
        entries
            .iter()
            .map(|(key, value)| DimensionEntry {
                key: *key,
                value: (*value).to_owned(),
            })
            .collect(),
    )
}

/// Returns the `(key, value)` pairs of a table.
pub fn pairs(table: &DimensionTable) -> Vec<(u64, String)> {
    table
        .entries()
        .iter()
        .map(|entry| (entry.key, entry.value.clone()))
        .collect()
}
