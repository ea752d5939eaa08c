//! The extract stage: fetch one day from each source and land it in the pending area.

mod source;

use bytes::Bytes;
use chrono::{Months, NaiveDate};
use serde_json::Value;
use tracing::{error, info};

pub use source::{
    RecordSource, TaxiApiSource, WeatherApiSource, build_http_client, taxi_where_clause,
};

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::layout::{Layout, RawStatus, SourceKind};
use crate::store::ObjectStore;
use crate::{bail, etl_error};

/// Returns the day to extract when none is given: `today` minus `lag_months`.
///
/// The day of month is clamped to the end of a shorter month.
pub fn default_extract_date(today: NaiveDate, lag_months: u32) -> EtlResult<NaiveDate> {
    match today.checked_sub_months(Months::new(lag_months)) {
        Some(date) => Ok(date),
        None => bail!(
            ErrorKind::ConfigError,
            "Extraction date is out of range",
            format!("{today} minus {lag_months} months is not a valid date")
        ),
    }
}

/// A raw document landed in the pending area.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub kind: SourceKind,
    pub key: String,
    pub bytes: usize,
}

/// A source whose document could not be landed.
#[derive(Debug, Clone)]
pub struct FailedExtract {
    pub kind: SourceKind,
    pub error: EtlError,
}

/// Outcome of one extract run.
#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub date: NaiveDate,
    pub extracted: Vec<ExtractedFile>,
    pub failed: Vec<FailedExtract>,
}

impl ExtractReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Aggregates the errors of every failed source, or returns [`None`] if none failed.
    pub fn error(&self) -> Option<EtlError> {
        if self.failed.is_empty() {
            return None;
        }

        let errors: Vec<EtlError> = self.failed.iter().map(|f| f.error.clone()).collect();
        Some(EtlError::from(errors))
    }
}

/// Lands one day of taxi trips and weather as raw JSON.
#[derive(Debug)]
pub struct Extractor<S, T, W> {
    store: S,
    layout: Layout,
    taxi: T,
    weather: W,
}

impl<S, T, W> Extractor<S, T, W>
where
    S: ObjectStore,
    T: RecordSource,
    W: RecordSource,
{
    pub fn new(store: S, layout: Layout, taxi: T, weather: W) -> Self {
        Self {
            store,
            layout,
            taxi,
            weather,
        }
    }

    /// Extracts `date` from every source. A failing source does not stop the others.
    pub async fn run(&self, date: NaiveDate) -> ExtractReport {
        info!(%date, store = S::name(), "starting extract run");

        let mut report = ExtractReport {
            date,
            extracted: Vec::new(),
            failed: Vec::new(),
        };

        let outcomes = [
            (self.taxi.kind(), self.extract(&self.taxi, date).await),
            (self.weather.kind(), self.extract(&self.weather, date).await),
        ];
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(file) => {
                    info!(kind = %kind, key = %file.key, bytes = file.bytes, "landed raw file");
                    report.extracted.push(file);
                }
                Err(err) => {
                    error!(kind = %kind, error = %err, "extraction failed");
                    report.failed.push(FailedExtract { kind, error: err });
                }
            }
        }

        report
    }

    async fn extract<R: RecordSource>(&self, source: &R, date: NaiveDate) -> EtlResult<ExtractedFile> {
        let kind = source.kind();
        let document = source.fetch(date).await?;
        if is_empty_document(&document) {
            bail!(
                ErrorKind::EmptyInput,
                "Source returned no data",
                format!("the {kind} source returned an empty document for {date}")
            );
        }

        let data = serde_json::to_vec(&document).map_err(|err| {
            etl_error!(
                ErrorKind::SerializationError,
                "Raw document could not be serialized",
                format!("{kind} document for {date}"),
                source: err
            )
        })?;
        let key = self.layout.raw_key(
            RawStatus::Pending,
            kind,
            &Layout::raw_file_name(kind, date),
        );
        let bytes = data.len();
        self.store.put(&key, Bytes::from(data)).await?;

        Ok(ExtractedFile { kind, key, bytes })
    }
}

fn is_empty_document(document: &Value) -> bool {
    match document {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}
