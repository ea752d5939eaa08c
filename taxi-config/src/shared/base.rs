use thiserror::Error;

/// Errors returned by the `validate` methods of the configuration types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside its accepted range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// A list that must contain unique entries has a repeated one.
    #[error("`{field}` contains `{value}` more than once")]
    DuplicateEntry { field: String, value: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, constraint: &str) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.to_owned(),
            constraint: constraint.to_owned(),
        }
    }
}
