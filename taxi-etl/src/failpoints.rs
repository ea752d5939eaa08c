//! Named fail points between the publish stages.
//!
//! Only compiled with the `failpoints` feature. A point does nothing until it is configured
//! through the `fail` crate. The optional action parameter picks the error kind:
//! `no_retry`, `manual_retry` or `timed_retry`.

use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

pub const PUBLISH_BEFORE_BACKUP_FP: &str = "publish.before_backup";
pub const PUBLISH_AFTER_DIMENSION_PUBLISH_FP: &str = "publish.after_dimension_publish";
pub const PUBLISH_AFTER_FACT_PUBLISH_FP: &str = "publish.after_fact_publish";
pub const ARCHIVE_AFTER_COPY_FP: &str = "archive.after_copy";

pub fn etl_fail_point(name: &str) -> EtlResult<()> {
    fail_point!(name, |parameter| {
        let mut error_kind = ErrorKind::WithNoRetry;
        if let Some(parameter) = parameter {
            error_kind = match parameter.as_str() {
                "no_retry" => ErrorKind::WithNoRetry,
                "manual_retry" => ErrorKind::WithManualRetry,
                "timed_retry" => ErrorKind::WithTimedRetry,
                _ => ErrorKind::WithNoRetry,
            }
        }

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
