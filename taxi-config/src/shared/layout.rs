use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Top-level prefixes of the object layout.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LayoutConfig {
    /// Prefix under which raw JSON lands, split into `pending` and `processed`.
    #[serde(default = "default_raw_prefix")]
    pub raw_prefix: String,
    /// Prefix under which dimension tables and fact outputs are written.
    #[serde(default = "default_transformed_prefix")]
    pub transformed_prefix: String,
}

impl LayoutConfig {
    pub const DEFAULT_RAW_PREFIX: &'static str = "raw_data";

    pub const DEFAULT_TRANSFORMED_PREFIX: &'static str = "transformed_data";

    /// Validates that both prefixes are non-empty, distinct and free of surrounding slashes.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, prefix) in [
            ("layout.raw_prefix", &self.raw_prefix),
            ("layout.transformed_prefix", &self.transformed_prefix),
        ] {
            if prefix.is_empty() {
                return Err(ValidationError::invalid(field, "must not be empty"));
            }
            if prefix.starts_with('/') || prefix.ends_with('/') {
                return Err(ValidationError::invalid(
                    field,
                    "must not start or end with `/`",
                ));
            }
        }

        if self.raw_prefix == self.transformed_prefix {
            return Err(ValidationError::invalid(
                "layout.transformed_prefix",
                "must differ from `layout.raw_prefix`",
            ));
        }

        Ok(())
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            raw_prefix: default_raw_prefix(),
            transformed_prefix: default_transformed_prefix(),
        }
    }
}

fn default_raw_prefix() -> String {
    LayoutConfig::DEFAULT_RAW_PREFIX.to_owned()
}

fn default_transformed_prefix() -> String {
    LayoutConfig::DEFAULT_TRANSFORMED_PREFIX.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid() {
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn identical_prefixes_are_rejected() {
        let config = LayoutConfig {
            raw_prefix: "data".to_owned(),
            transformed_prefix: "data".to_owned(),
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn trailing_slash_is_rejected() {
        let config = LayoutConfig {
            raw_prefix: "raw/".to_owned(),
            ..LayoutConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::invalid(
                "layout.raw_prefix",
                "must not start or end with `/`"
            ))
        );
    }
}
