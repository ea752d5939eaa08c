//! Object key layout of the pipeline.
//!
//! ```text
//! {raw}/pending/{kind}/{kind}_{date}.json          raw input awaiting processing
//! {raw}/processed/{kind}/{kind}_{date}.json        archived raw input
//! {transformed}/dim_{attr}/dim_{attr}.csv          current dimension table
//! {transformed}/dim_{attr}_previous_versions/dim_{attr}.csv
//! {transformed}/fact_taxi_trips/taxi_{date}.csv    enriched trips
//! {transformed}/dim_weather/weather_{date}.csv     hourly weather
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use taxi_config::shared::LayoutConfig;

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};

/// Extension of raw input objects.
pub const RAW_EXTENSION: &str = "json";

/// Extension of every transformed output.
pub const OUTPUT_EXTENSION: &str = "csv";

/// Lifecycle area of a raw input object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawStatus {
    Pending,
    Processed,
}

impl RawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawStatus::Pending => "pending",
            RawStatus::Processed => "processed",
        }
    }
}

/// Kind of raw data landed by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Taxi,
    Weather,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Taxi => "taxi",
            SourceKind::Weather => "weather",
        }
    }

    /// Name of the table the transformed output of this kind belongs to.
    fn output_table(&self) -> &'static str {
        match self {
            SourceKind::Taxi => "fact_taxi_trips",
            SourceKind::Weather => "dim_weather",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "taxi" => Ok(SourceKind::Taxi),
            "weather" => Ok(SourceKind::Weather),
            other => bail!(
                ErrorKind::InvalidData,
                "Unknown source kind",
                format!("`{other}` is neither `taxi` nor `weather`")
            ),
        }
    }
}

/// Builds object keys from the configured prefixes.
#[derive(Debug, Clone)]
pub struct Layout {
    raw_prefix: String,
    transformed_prefix: String,
}

impl Layout {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            raw_prefix: config.raw_prefix.clone(),
            transformed_prefix: config.transformed_prefix.clone(),
        }
    }

    /// Returns the listing prefix of raw objects of `kind` in `status`, ending with `/`.
    pub fn raw_dir(&self, status: RawStatus, kind: SourceKind) -> String {
        format!("{}/{}/{}/", self.raw_prefix, status.as_str(), kind.as_str())
    }

    /// Returns the key of a raw object.
    pub fn raw_key(&self, status: RawStatus, kind: SourceKind, file_name: &str) -> String {
        format!("{}{file_name}", self.raw_dir(status, kind))
    }

    /// Returns the processed-area key matching a pending raw key.
    ///
    /// Fails if `pending_key` is not located in the pending area of `kind`.
    pub fn archive_key_for(&self, kind: SourceKind, pending_key: &str) -> EtlResult<String> {
        let pending_dir = self.raw_dir(RawStatus::Pending, kind);
        match pending_key.strip_prefix(&pending_dir) {
            Some(file_name) if !file_name.is_empty() => {
                Ok(self.raw_key(RawStatus::Processed, kind, file_name))
            }
            _ => bail!(
                ErrorKind::InvalidData,
                "Raw object is outside the pending area",
                format!("`{pending_key}` does not start with `{pending_dir}`")
            ),
        }
    }

    /// Returns the name of the dimension table holding `attribute`.
    pub fn dimension_table(attribute: &str) -> String {
        format!("dim_{attribute}")
    }

    /// Returns the key of the current version of a dimension table.
    pub fn dimension_key(&self, attribute: &str) -> String {
        let table = Self::dimension_table(attribute);
        format!(
            "{}/{table}/{table}.{OUTPUT_EXTENSION}",
            self.transformed_prefix
        )
    }

    /// Returns the key of the single retained previous version of a dimension table.
    pub fn dimension_backup_key(&self, attribute: &str) -> String {
        let table = Self::dimension_table(attribute);
        format!(
            "{}/{table}_previous_versions/{table}.{OUTPUT_EXTENSION}",
            self.transformed_prefix
        )
    }

    /// Returns the key of the transformed output of `kind` for `date`.
    pub fn output_key(&self, kind: SourceKind, date: NaiveDate) -> String {
        format!(
            "{}/{}/{}_{}.{OUTPUT_EXTENSION}",
            self.transformed_prefix,
            kind.output_table(),
            kind.as_str(),
            date.format("%Y-%m-%d")
        )
    }

    /// Returns the file name the extractor gives to the raw data of `kind` for `date`.
    pub fn raw_file_name(kind: SourceKind, date: NaiveDate) -> String {
        format!("{}_{}.{RAW_EXTENSION}", kind.as_str(), date.format("%Y-%m-%d"))
    }

    /// Returns whether a listed key is a raw input the loader should pick up.
    pub fn is_raw_input(key: &str) -> bool {
        key.rsplit('/')
            .next()
            .and_then(|file_name| file_name.rsplit_once('.'))
            .is_some_and(|(stem, extension)| !stem.is_empty() && extension == RAW_EXTENSION)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(&LayoutConfig::default())
    }
}
