use std::fmt;

use indexmap::IndexMap;

use crate::error::EtlError;
use crate::layout::SourceKind;

/// Step of the per-file publish sequence.
///
/// Steps up to and including [`PublishStage::Enrich`] only read from the store. A failure from
/// [`PublishStage::Backup`] onwards may leave some outputs written and others not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PublishStage {
    Load,
    Transform,
    Reconcile,
    Enrich,
    Backup,
    PublishDimensions,
    PublishFacts,
    Archive,
}

impl PublishStage {
    /// Returns whether a failure at this stage may have left a partial publish behind.
    pub fn writes_externally(&self) -> bool {
        *self >= PublishStage::Backup
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStage::Load => "load",
            PublishStage::Transform => "transform",
            PublishStage::Reconcile => "reconcile",
            PublishStage::Enrich => "enrich",
            PublishStage::Backup => "backup",
            PublishStage::PublishDimensions => "publish_dimensions",
            PublishStage::PublishFacts => "publish_facts",
            PublishStage::Archive => "archive",
        }
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw file that was fully published and archived.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub kind: SourceKind,
    pub source_key: String,
    pub output_key: String,
    pub archive_key: String,
    pub rows: usize,
    /// Number of values added to each dimension, in dimension order. Empty for weather files.
    pub new_dimension_values: IndexMap<String, usize>,
}

/// A raw file whose processing stopped at `stage`.
#[derive(Debug, Clone)]
pub struct FailedFile {
    pub kind: SourceKind,
    pub source_key: String,
    pub stage: PublishStage,
    pub error: EtlError,
}

impl FailedFile {
    /// Returns whether outputs of this file may have been partially written.
    ///
    /// Such a file needs operator inspection. Its raw input is still in the pending area, so a
    /// later run picks it up again.
    pub fn partial_publish(&self) -> bool {
        self.stage.writes_externally()
    }
}

/// Outcome of one load run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub processed: Vec<ProcessedFile>,
    pub failed: Vec<FailedFile>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn partial_publishes(&self) -> impl Iterator<Item = &FailedFile> {
        self.failed.iter().filter(|file| file.partial_publish())
    }

    /// Aggregates the errors of every failed file, or returns [`None`] if none failed.
    pub fn error(&self) -> Option<EtlError> {
        if self.failed.is_empty() {
            return None;
        }

        let errors: Vec<EtlError> = self.failed.iter().map(|file| file.error.clone()).collect();
        Some(EtlError::from(errors))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s) processed, {} failed",
            self.processed.len(),
            self.failed.len()
        )?;

        for file in &self.processed {
            write!(
                f,
                "\n  ok      {} -> {} ({} rows",
                file.source_key, file.output_key, file.rows
            )?;
            for (dimension, added) in &file.new_dimension_values {
                write!(f, ", {added} new {dimension}")?;
            }
            write!(f, ")")?;
        }
        for file in &self.failed {
            write!(
                f,
                "\n  failed  {} at {}{}: {}",
                file.source_key,
                file.stage,
                if file.partial_publish() {
                    " (partial publish, inspect outputs)"
                } else {
                    ""
                },
                file.error.description().unwrap_or("multiple errors")
            )?;
            if let Some(detail) = file.error.detail() {
                write!(f, " ({detail})")?;
            }
        }

        Ok(())
    }
}
