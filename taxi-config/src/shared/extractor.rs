use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Settings of the extract stage.
///
/// This intentionally does not implement [`serde::Serialize`] so the optional API token is
/// never written back out.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExtractorConfig {
    /// Socrata endpoint serving Chicago taxi trips.
    #[serde(default = "default_taxi_api_url")]
    pub taxi_api_url: String,
    /// Maximum number of trips requested for one day.
    #[serde(default = "default_taxi_row_limit")]
    pub taxi_row_limit: u32,
    /// Optional Socrata application token sent as `X-App-Token`.
    #[serde(default)]
    pub taxi_app_token: Option<SecretString>,
    /// Open-Meteo archive endpoint serving hourly weather.
    #[serde(default = "default_weather_api_url")]
    pub weather_api_url: String,
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    /// Hourly weather variables requested from the archive.
    #[serde(default = "default_hourly_variables")]
    pub hourly_variables: Vec<String>,
    /// How many months back the extracted day lies; the trip feed is published with a delay.
    #[serde(default = "default_lag_months")]
    pub lag_months: u32,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ExtractorConfig {
    pub const DEFAULT_TAXI_API_URL: &'static str =
        "https://data.cityofchicago.org/resource/ajtu-isnz.json";

    pub const DEFAULT_WEATHER_API_URL: &'static str = "https://archive-api.open-meteo.com/v1/era5";

    pub const DEFAULT_TAXI_ROW_LIMIT: u32 = 30_000;

    pub const DEFAULT_LAG_MONTHS: u32 = 2;

    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

    /// Validates extractor settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, url) in [
            ("extractor.taxi_api_url", &self.taxi_api_url),
            ("extractor.weather_api_url", &self.weather_api_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ValidationError::invalid(field, "must be an http(s) URL"));
            }
        }

        if self.taxi_row_limit == 0 {
            return Err(ValidationError::invalid(
                "extractor.taxi_row_limit",
                "must be greater than 0",
            ));
        }

        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::invalid(
                "extractor.latitude",
                "must be within [-90, 90]",
            ));
        }

        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::invalid(
                "extractor.longitude",
                "must be within [-180, 180]",
            ));
        }

        if self.hourly_variables.is_empty() {
            return Err(ValidationError::invalid(
                "extractor.hourly_variables",
                "must list at least one variable",
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(ValidationError::invalid(
                "extractor.request_timeout_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            taxi_api_url: default_taxi_api_url(),
            taxi_row_limit: default_taxi_row_limit(),
            taxi_app_token: None,
            weather_api_url: default_weather_api_url(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            hourly_variables: default_hourly_variables(),
            lag_months: default_lag_months(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_taxi_api_url() -> String {
    ExtractorConfig::DEFAULT_TAXI_API_URL.to_owned()
}

fn default_taxi_row_limit() -> u32 {
    ExtractorConfig::DEFAULT_TAXI_ROW_LIMIT
}

fn default_weather_api_url() -> String {
    ExtractorConfig::DEFAULT_WEATHER_API_URL.to_owned()
}

fn default_latitude() -> f64 {
    41.85
}

fn default_longitude() -> f64 {
    -87.65
}

fn default_hourly_variables() -> Vec<String> {
    ["temperature_2m", "wind_speed_10m", "rain", "precipitation"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_lag_months() -> u32 {
    ExtractorConfig::DEFAULT_LAG_MONTHS
}

fn default_request_timeout_ms() -> u64 {
    ExtractorConfig::DEFAULT_REQUEST_TIMEOUT_MS
}
