use std::sync::Arc;

use indexmap::IndexMap;
use taxi_config::shared::LoaderConfig;
use tracing::{error, info, warn};

use crate::conversions::csv::encode_batch;
use crate::conversions::json::decode_records;
use crate::dimension::{DimensionStore, DimensionTable, reconcile};
use crate::enrich::enrich;
use crate::error::EtlResult;
#[cfg(feature = "failpoints")]
use crate::failpoints::{
    ARCHIVE_AFTER_COPY_FP, PUBLISH_AFTER_DIMENSION_PUBLISH_FP, PUBLISH_AFTER_FACT_PUBLISH_FP,
    PUBLISH_BEFORE_BACKUP_FP, etl_fail_point,
};
use crate::layout::{Layout, RawStatus, SourceKind};
use crate::publish::{FailedFile, ProcessedFile, PublishStage, RunReport};
use crate::store::ObjectStore;
use crate::transform::{
    WEATHER_DATETIME_COLUMN, WEATHER_HOUR_COLUMN, batch_date, transform_taxi, transform_weather,
};

/// Working copies of the dimension tables, keyed by attribute in join order.
type WorkingDimensions = IndexMap<String, DimensionTable>;

/// Runs the transform-load stage over every pending raw file.
///
/// Files are processed one at a time, taxi files first, in key order. Each taxi file goes
/// through [`PublishStage::Load`] to [`PublishStage::Archive`]; weather files skip the dimension
/// stages. A failing file is recorded in the [`RunReport`] and the run moves on to the next one.
///
/// The coordinator keeps one working copy of each dimension for the whole run. A copy only
/// changes once its new version has been published, so the next file always reconciles against
/// what is persisted. Running two coordinators against the same dimensions at once is not
/// supported.
#[derive(Debug)]
pub struct PublishCoordinator<S> {
    config: Arc<LoaderConfig>,
    store: S,
    layout: Layout,
    dimensions: DimensionStore<S>,
}

impl<S> PublishCoordinator<S>
where
    S: ObjectStore + Clone,
{
    pub fn new(config: LoaderConfig, layout: Layout, store: S) -> Self {
        let dimensions = DimensionStore::new(store.clone(), layout.clone());

        Self {
            config: Arc::new(config),
            store,
            layout,
            dimensions,
        }
    }

    pub fn dimensions(&self) -> &DimensionStore<S> {
        &self.dimensions
    }

    /// Processes every pending file and reports the outcome of each.
    ///
    /// Only failures that prevent the report itself from being built are returned as errors;
    /// everything else ends up in [`RunReport::failed`].
    pub async fn run(&self) -> EtlResult<RunReport> {
        info!(
            store = S::name(),
            dimensions = ?self.config.dimensions,
            "starting load run"
        );

        let mut report = RunReport::default();

        // We load the dimensions once per run. If they cannot be read, every pending taxi file
        // fails at the load stage, but weather files are still processed.
        let dimensions = self.load_dimensions().await;
        if let Some(keys) = self.pending_keys(SourceKind::Taxi, &mut report).await {
            match dimensions {
                Ok(mut working) => {
                    for key in keys {
                        let outcome = self.process_taxi_file(&key, &mut working).await;
                        record(&mut report, outcome);
                    }
                }
                Err(err) => {
                    error!(
                        error = %err,
                        files = keys.len(),
                        "failed to load dimension tables, skipping taxi files"
                    );
                    for key in keys {
                        let failed = FailedFile {
                            kind: SourceKind::Taxi,
                            source_key: key,
                            stage: PublishStage::Load,
                            error: err.clone(),
                        };
                        record(&mut report, Err(failed));
                    }
                }
            }
        }

        if let Some(keys) = self.pending_keys(SourceKind::Weather, &mut report).await {
            for key in keys {
                let outcome = self.process_weather_file(&key).await;
                record(&mut report, outcome);
            }
        }

        info!(
            processed = report.processed.len(),
            failed = report.failed.len(),
            partial_publishes = report.partial_publishes().count(),
            "load run finished"
        );

        Ok(report)
    }

    async fn load_dimensions(&self) -> EtlResult<WorkingDimensions> {
        let mut working = IndexMap::with_capacity(self.config.dimensions.len());
        for attribute in &self.config.dimensions {
            let table = self.dimensions.load_current(attribute).await?;
            info!(dimension = %attribute, entries = table.len(), "loaded dimension");
            working.insert(attribute.clone(), table);
        }

        Ok(working)
    }

    /// Lists the pending raw inputs of `kind`, recording a listing failure in the report.
    async fn pending_keys(&self, kind: SourceKind, report: &mut RunReport) -> Option<Vec<String>> {
        let prefix = self.layout.raw_dir(RawStatus::Pending, kind);
        match self.store.list(&prefix).await {
            Ok(keys) => {
                let keys: Vec<String> = keys
                    .into_iter()
                    .filter(|key| Layout::is_raw_input(key))
                    .collect();
                info!(kind = %kind, files = keys.len(), "listed pending files");

                Some(keys)
            }
            Err(err) => {
                error!(kind = %kind, error = %err, "failed to list pending files");
                report.failed.push(FailedFile {
                    kind,
                    source_key: prefix,
                    stage: PublishStage::Load,
                    error: err,
                });

                None
            }
        }
    }

    async fn process_taxi_file(
        &self,
        key: &str,
        working: &mut WorkingDimensions,
    ) -> Result<ProcessedFile, FailedFile> {
        let mut stage = PublishStage::Load;
        let result = self.publish_taxi_file(key, working, &mut stage).await;

        result.map_err(|error| FailedFile {
            kind: SourceKind::Taxi,
            source_key: key.to_owned(),
            stage,
            error,
        })
    }

    async fn publish_taxi_file(
        &self,
        key: &str,
        working: &mut WorkingDimensions,
        stage: &mut PublishStage,
    ) -> EtlResult<ProcessedFile> {
        *stage = PublishStage::Load;
        let archive_key = self.layout.archive_key_for(SourceKind::Taxi, key)?;
        let data = self.store.get(key).await?;

        *stage = PublishStage::Transform;
        let trips = transform_taxi(decode_records(&data)?)?;
        let date = batch_date(&trips, WEATHER_HOUR_COLUMN)?;
        let output_key = self.layout.output_key(SourceKind::Taxi, date);

        *stage = PublishStage::Reconcile;
        let mut updated = IndexMap::with_capacity(working.len());
        let mut new_dimension_values = IndexMap::with_capacity(working.len());
        for (attribute, current) in working.iter() {
            let table = reconcile(&trips, current, attribute, self.config.start_key)?;
            new_dimension_values.insert(attribute.clone(), table.len() - current.len());
            updated.insert(attribute.clone(), table);
        }

        *stage = PublishStage::Enrich;
        let facts = enrich(&trips, &updated)?;
        let encoded_facts = encode_batch(&facts)?;

        // From here on every failure may leave a partial publish behind.
        *stage = PublishStage::Backup;
        #[cfg(feature = "failpoints")]
        etl_fail_point(PUBLISH_BEFORE_BACKUP_FP)?;

        let changed: Vec<(String, DimensionTable)> = updated
            .into_iter()
            .filter(|(attribute, _)| {
                new_dimension_values
                    .get(attribute)
                    .is_some_and(|added| *added > 0)
            })
            .collect();
        for (attribute, _) in &changed {
            let backed_up = self.dimensions.backup(attribute).await?;
            if !backed_up {
                info!(file = key, dimension = %attribute, "no current version to back up");
            }
        }

        *stage = PublishStage::PublishDimensions;
        for (attribute, table) in changed {
            self.dimensions.publish(&table).await?;
            info!(
                file = key,
                dimension = %attribute,
                new_values = new_dimension_values.get(&attribute).copied().unwrap_or_default(),
                entries = table.len(),
                "published dimension"
            );
            working.insert(attribute, table);
        }

        #[cfg(feature = "failpoints")]
        etl_fail_point(PUBLISH_AFTER_DIMENSION_PUBLISH_FP)?;

        *stage = PublishStage::PublishFacts;
        self.store.put(&output_key, encoded_facts).await?;

        #[cfg(feature = "failpoints")]
        etl_fail_point(PUBLISH_AFTER_FACT_PUBLISH_FP)?;

        *stage = PublishStage::Archive;
        self.archive(key, &archive_key).await?;

        Ok(ProcessedFile {
            kind: SourceKind::Taxi,
            source_key: key.to_owned(),
            output_key,
            archive_key,
            rows: facts.len(),
            new_dimension_values,
        })
    }

    async fn process_weather_file(&self, key: &str) -> Result<ProcessedFile, FailedFile> {
        let mut stage = PublishStage::Load;
        let result = self.publish_weather_file(key, &mut stage).await;

        result.map_err(|error| FailedFile {
            kind: SourceKind::Weather,
            source_key: key.to_owned(),
            stage,
            error,
        })
    }

    async fn publish_weather_file(
        &self,
        key: &str,
        stage: &mut PublishStage,
    ) -> EtlResult<ProcessedFile> {
        *stage = PublishStage::Load;
        let archive_key = self.layout.archive_key_for(SourceKind::Weather, key)?;
        let data = self.store.get(key).await?;

        *stage = PublishStage::Transform;
        let weather = transform_weather(&data)?;
        let date = batch_date(&weather, WEATHER_DATETIME_COLUMN)?;
        let output_key = self.layout.output_key(SourceKind::Weather, date);
        let encoded = encode_batch(&weather)?;

        *stage = PublishStage::PublishFacts;
        self.store.put(&output_key, encoded).await?;

        *stage = PublishStage::Archive;
        self.archive(key, &archive_key).await?;

        Ok(ProcessedFile {
            kind: SourceKind::Weather,
            source_key: key.to_owned(),
            output_key,
            archive_key,
            rows: weather.len(),
            new_dimension_values: IndexMap::new(),
        })
    }

    /// Moves a raw file from the pending to the processed area.
    ///
    /// A crash between the copy and the delete leaves the file in both areas. The next run then
    /// processes it again, which reconciles to the same keys and rewrites the same output.
    async fn archive(&self, pending_key: &str, archive_key: &str) -> EtlResult<()> {
        self.store.copy(pending_key, archive_key).await?;

        #[cfg(feature = "failpoints")]
        etl_fail_point(ARCHIVE_AFTER_COPY_FP)?;

        self.store.delete(pending_key).await
    }
}

fn record(report: &mut RunReport, outcome: Result<ProcessedFile, FailedFile>) {
    match outcome {
        Ok(file) => {
            info!(
                file = %file.source_key,
                output = %file.output_key,
                rows = file.rows,
                new_values = ?file.new_dimension_values,
                "processed file"
            );
            report.processed.push(file);
        }
        Err(file) => {
            if file.partial_publish() {
                warn!(
                    file = %file.source_key,
                    stage = %file.stage,
                    error = %file.error,
                    "file failed after publishing started, outputs may be partially written"
                );
            } else {
                error!(
                    file = %file.source_key,
                    stage = %file.stage,
                    error = %file.error,
                    "file failed before any write"
                );
            }
            report.failed.push(file);
        }
    }
}
