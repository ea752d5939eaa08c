use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use taxi_config::shared::ExtractorConfig;
use tracing::debug;

use crate::error::EtlResult;
use crate::layout::SourceKind;

/// A public API serving one day of raw data of a single [`SourceKind`].
pub trait RecordSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetches the raw document for `date`, exactly as the API returned it.
    fn fetch(&self, date: NaiveDate) -> impl Future<Output = EtlResult<Value>> + Send;
}

/// Builds the HTTP client shared by the sources.
pub fn build_http_client(config: &ExtractorConfig) -> EtlResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .build()?;

    Ok(client)
}

/// Chicago taxi trips from the Socrata open data API.
#[derive(Debug, Clone)]
pub struct TaxiApiSource {
    client: reqwest::Client,
    url: String,
    row_limit: u32,
    app_token: Option<SecretString>,
}

impl TaxiApiSource {
    pub fn new(client: reqwest::Client, config: &ExtractorConfig) -> Self {
        Self {
            client,
            url: config.taxi_api_url.clone(),
            row_limit: config.taxi_row_limit,
            app_token: config.taxi_app_token.clone(),
        }
    }
}

/// Returns the SoQL filter selecting the trips that started on `date`.
pub fn taxi_where_clause(date: NaiveDate) -> String {
    format!(
        "trip_start_timestamp >= '{date}T00:00:00' AND trip_start_timestamp <= '{date}T23:59:59'"
    )
}

impl RecordSource for TaxiApiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Taxi
    }

    async fn fetch(&self, date: NaiveDate) -> EtlResult<Value> {
        debug!(url = %self.url, %date, "requesting taxi trips");

        let mut request = self.client.get(&self.url).query(&[
            ("$where", taxi_where_clause(date)),
            ("$limit", self.row_limit.to_string()),
        ]);
        if let Some(token) = &self.app_token {
            request = request.header("X-App-Token", token.expose_secret().as_str());
        }

        let response = request.send().await?.error_for_status()?;
        let document = response.json::<Value>().await?;

        Ok(document)
    }
}

/// Hourly weather for a fixed location from the Open-Meteo archive API.
#[derive(Debug, Clone)]
pub struct WeatherApiSource {
    client: reqwest::Client,
    url: String,
    latitude: f64,
    longitude: f64,
    hourly_variables: Vec<String>,
}

impl WeatherApiSource {
    pub fn new(client: reqwest::Client, config: &ExtractorConfig) -> Self {
        Self {
            client,
            url: config.weather_api_url.clone(),
            latitude: config.latitude,
            longitude: config.longitude,
            hourly_variables: config.hourly_variables.clone(),
        }
    }

    fn query(&self, date: NaiveDate) -> [(&'static str, String); 5] {
        [
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("start_date", date.to_string()),
            ("end_date", date.to_string()),
            ("hourly", self.hourly_variables.join(",")),
        ]
    }
}

impl RecordSource for WeatherApiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Weather
    }

    async fn fetch(&self, date: NaiveDate) -> EtlResult<Value> {
        debug!(url = %self.url, %date, "requesting hourly weather");

        let response = self
            .client
            .get(&self.url)
            .query(&self.query(date))
            .send()
            .await?
            .error_for_status()?;
        let document = response.json::<Value>().await?;

        Ok(document)
    }
}
