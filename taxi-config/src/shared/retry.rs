use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Exponential backoff applied when a run fails with retriable errors.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total number of attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after every failed attempt.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl RetryConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;

    pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

    pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

    /// Returns the delay to wait after `failed_attempts` failed attempts.
    ///
    /// The first retry waits `initial_delay_ms`; every further one multiplies it by
    /// `backoff_factor`, capped at `max_delay_ms`.
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1) as i32;
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_factor.powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64);

        Duration::from_millis(capped as u64)
    }

    /// Validates retry settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::invalid(
                "retry.max_attempts",
                "must be greater than 0",
            ));
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ValidationError::invalid(
                "retry.backoff_factor",
                "must be a finite number >= 1.0",
            ));
        }

        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ValidationError::invalid(
                "retry.initial_delay_ms",
                "must not exceed `retry.max_delay_ms`",
            ));
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

fn default_max_attempts() -> u32 {
    RetryConfig::DEFAULT_MAX_ATTEMPTS
}

fn default_initial_delay_ms() -> u64 {
    RetryConfig::DEFAULT_INITIAL_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    RetryConfig::DEFAULT_MAX_DELAY_MS
}

fn default_backoff_factor() -> f64 {
    RetryConfig::DEFAULT_BACKOFF_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_and_is_capped() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 350,
            backoff_factor: 2.0,
        };

        assert_eq!(config.delay_after(1), Duration::from_millis(100));
        assert_eq!(config.delay_after(2), Duration::from_millis(200));
        assert_eq!(config.delay_after(3), Duration::from_millis(350));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        };

        assert!(config.validate().is_err());
    }
}
