use serde::Deserialize;
use taxi_config::shared::{
    ExtractorConfig, LayoutConfig, LoaderConfig, StorageConfig, ValidationError,
};
use taxi_config::{Config, load_config};

use crate::error::{RunnerError, RunnerResult};

/// Complete configuration of the runner binary.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.storage.validate()?;
        self.layout.validate()?;
        self.extractor.validate()?;
        self.loader.validate()?;

        Ok(())
    }
}

impl Config for RunnerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] =
        &["extractor.hourly_variables", "loader.dimensions"];
}

/// Loads and validates the runner configuration.
///
/// Uses the standard configuration loading mechanism from [`taxi_config`] and validates the
/// resulting [`RunnerConfig`] before returning it.
pub fn load_runner_config() -> RunnerResult<RunnerConfig> {
    let config = load_config::<RunnerConfig>().map_err(RunnerError::config)?;
    config.validate().map_err(RunnerError::config)?;

    Ok(config)
}
