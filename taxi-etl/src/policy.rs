use crate::error::{ErrorKind, EtlError};

/// Retry behavior for a classified error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryDirective {
    /// The run can be retried automatically after a delay.
    Timed,
    /// The run should only be retried after manual intervention.
    Manual,
    /// The run should not be retried.
    NoRetry,
}

/// Policy describing how an [`EtlError`] should be handled at the orchestration boundary.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ErrorHandlingPolicy {
    retry_directive: RetryDirective,
    solution: Option<&'static str>,
}

impl ErrorHandlingPolicy {
    const fn new(retry_directive: RetryDirective, solution: Option<&'static str>) -> Self {
        Self {
            retry_directive,
            solution,
        }
    }

    /// Returns the retry directive for this policy.
    pub fn retry_directive(&self) -> RetryDirective {
        self.retry_directive
    }

    /// Returns an optional operator-facing solution message.
    pub fn solution(&self) -> Option<&'static str> {
        self.solution
    }
}

/// Builds an [`ErrorHandlingPolicy`] from an [`EtlError`].
///
/// Aggregated errors are only retried automatically when every contained error is.
pub fn build_error_handling_policy(error: &EtlError) -> ErrorHandlingPolicy {
    if let Some(errors) = error.errors() {
        let policies: Vec<_> = errors.iter().map(build_error_handling_policy).collect();
        return policies
            .iter()
            .copied()
            .find(|policy| policy.retry_directive != RetryDirective::Timed)
            .or_else(|| policies.first().copied())
            .unwrap_or(ErrorHandlingPolicy::new(RetryDirective::NoRetry, None));
    }

    match error.kind() {
        // Transient storage and source connectivity failures.
        ErrorKind::StorageError | ErrorKind::SourceConnectionFailed => {
            ErrorHandlingPolicy::new(RetryDirective::Timed, None)
        }

        ErrorKind::EmptyInput => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Check that the source returned data for the requested day, then extract it again."),
        ),
        ErrorKind::IntegrityError => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some(
                "Inspect the dimension table for duplicate values or keys, or the raw file for a column that collides with a key column. Roll the dimension back if it was corrupted.",
            ),
        ),
        ErrorKind::UnmatchedDimensionValue => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Check that the dimension table was reconciled and published before enrichment."),
        ),
        ErrorKind::MissingColumn | ErrorKind::InvalidData | ErrorKind::ConversionError => {
            ErrorHandlingPolicy::new(
                RetryDirective::Manual,
                Some("Fix or remove the offending raw file in the pending area."),
            )
        }
        ErrorKind::StorageObjectNotFound => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Verify that the object was not moved or deleted by another process."),
        ),
        ErrorKind::SourceApiError => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Verify the source API URL, parameters and application token."),
        ),
        ErrorKind::ConfigError => ErrorHandlingPolicy::new(
            RetryDirective::NoRetry,
            Some("Fix the configuration and restart."),
        ),

        // Special handling for fault injection tests.
        #[cfg(feature = "failpoints")]
        ErrorKind::WithNoRetry => {
            ErrorHandlingPolicy::new(RetryDirective::NoRetry, Some("Cannot retry this error."))
        }
        #[cfg(feature = "failpoints")]
        ErrorKind::WithManualRetry => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some("Manually trigger retry after resolving the issue."),
        ),
        #[cfg(feature = "failpoints")]
        ErrorKind::WithTimedRetry => ErrorHandlingPolicy::new(
            RetryDirective::Timed,
            Some("Will automatically retry after the configured delay."),
        ),

        _ => ErrorHandlingPolicy::new(
            RetryDirective::Manual,
            Some(
                "There is no single prescribed solution for this error. Inspect the failed file and the published tables before retrying.",
            ),
        ),
    }
}
