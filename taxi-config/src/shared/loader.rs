use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::{RetryConfig, ValidationError};

/// Settings of the transform-load stage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct LoaderConfig {
    /// Categorical taxi columns that are moved into dimension tables, in join order.
    #[serde(default = "default_dimensions")]
    pub dimensions: Vec<String>,
    /// First surrogate key handed out by an empty dimension table.
    #[serde(default = "default_start_key")]
    pub start_key: u64,
    /// Backoff for retrying runs that failed with retriable storage errors.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl LoaderConfig {
    pub const DEFAULT_START_KEY: u64 = 1;

    /// Validates loader settings.
    ///
    /// Dimension names must be non-empty and unique, and the start key must be positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for dimension in &self.dimensions {
            if dimension.trim().is_empty() {
                return Err(ValidationError::invalid(
                    "loader.dimensions",
                    "must not contain empty names",
                ));
            }
            if !seen.insert(dimension.as_str()) {
                return Err(ValidationError::DuplicateEntry {
                    field: "loader.dimensions".to_owned(),
                    value: dimension.clone(),
                });
            }
        }

        if self.start_key == 0 {
            return Err(ValidationError::invalid(
                "loader.start_key",
                "must be greater than 0",
            ));
        }

        self.retry.validate()
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
            start_key: default_start_key(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_dimensions() -> Vec<String> {
    vec!["payment_type".to_owned(), "company".to_owned()]
}

fn default_start_key() -> u64 {
    LoaderConfig::DEFAULT_START_KEY
}
