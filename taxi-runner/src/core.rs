use chrono::{Local, NaiveDate};
use taxi_config::shared::{RetryConfig, StorageConfig};
use taxi_etl::dimension::DimensionStore;
use taxi_etl::error::ErrorKind;
use taxi_etl::etl_error;
use taxi_etl::extract::{
    Extractor, TaxiApiSource, WeatherApiSource, build_http_client, default_extract_date,
};
use taxi_etl::layout::Layout;
use taxi_etl::policy::{RetryDirective, build_error_handling_policy};
use taxi_etl::publish::{PublishCoordinator, RunReport};
use taxi_etl::store::ObjectStore;
use taxi_etl::store::local::LocalStore;
use taxi_etl::store::memory::MemoryStore;
use tracing::{error, info, warn};

use crate::Command;
use crate::config::RunnerConfig;
use crate::error::{RunnerError, RunnerResult};

/// Runs `command` against the configured object store.
pub async fn run_command(command: Command, config: RunnerConfig) -> RunnerResult<()> {
    info!(storage = ?config.storage, layout = ?config.layout, "starting taxi runner");

    // Static dispatch over the store, one arm per backend.
    match config.storage.clone() {
        StorageConfig::Local { root } => {
            let store = LocalStore::new(root);
            run_with_store(command, config, store).await
        }
        StorageConfig::Memory => {
            warn!("using the in-memory store, nothing will be kept after the process exits");
            run_with_store(command, config, MemoryStore::new()).await
        }
    }
}

async fn run_with_store<S>(command: Command, config: RunnerConfig, store: S) -> RunnerResult<()>
where
    S: ObjectStore + Clone,
{
    match command {
        Command::Extract { date } => extract(&config, store, date).await,
        Command::Load => load(config, store).await,
        Command::Rollback { dimension, force } => {
            rollback(&config, store, &dimension, force).await
        }
    }
}

async fn extract<S>(config: &RunnerConfig, store: S, date: Option<NaiveDate>) -> RunnerResult<()>
where
    S: ObjectStore,
{
    let date = match date {
        Some(date) => date,
        None => default_extract_date(Local::now().date_naive(), config.extractor.lag_months)?,
    };

    let client = build_http_client(&config.extractor)?;
    let extractor = Extractor::new(
        store,
        Layout::new(&config.layout),
        TaxiApiSource::new(client.clone(), &config.extractor),
        WeatherApiSource::new(client, &config.extractor),
    );

    let report = extractor.run(date).await;
    if let Some(error) = report.error() {
        return Err(RunnerError::RunFailed {
            stage: "extract",
            failures: report.failed.len(),
            error,
        });
    }

    info!(%date, files = report.extracted.len(), "extract finished");

    Ok(())
}

/// Runs the load stage and fails when any file still failed after retries.
async fn load<S>(config: RunnerConfig, store: S) -> RunnerResult<()>
where
    S: ObjectStore + Clone,
{
    let retry = config.loader.retry.clone();
    let coordinator = PublishCoordinator::new(config.loader, Layout::new(&config.layout), store);

    let report = run_until_settled(&coordinator, &retry).await?;
    let Some(error) = report.error() else {
        info!(processed = report.processed.len(), "load finished");
        return Ok(());
    };

    log_failures(&report);
    if let Some(solution) = build_error_handling_policy(&error).solution() {
        warn!(solution, "load run needs attention");
    }

    Err(RunnerError::RunFailed {
        stage: "load",
        failures: report.failed.len(),
        error,
    })
}

/// Repeats the load run while every failure is transient, up to `retry.max_attempts` runs.
///
/// Files archived by an earlier attempt are no longer pending, so a repeated run only touches
/// what is left. The returned report holds the files processed by every attempt and the
/// failures of the last one.
async fn run_until_settled<S>(
    coordinator: &PublishCoordinator<S>,
    retry: &RetryConfig,
) -> RunnerResult<RunReport>
where
    S: ObjectStore + Clone,
{
    let mut summary = RunReport::default();

    let mut attempt = 1u32;
    loop {
        let report = coordinator.run().await?;
        summary.processed.extend(report.processed);
        summary.failed = report.failed;

        let Some(error) = summary.error() else {
            return Ok(summary);
        };
        let policy = build_error_handling_policy(&error);
        if policy.retry_directive() != RetryDirective::Timed || attempt >= retry.max_attempts {
            return Ok(summary);
        }

        let delay = retry.delay_after(attempt);
        warn!(
            attempt,
            processed = summary.processed.len(),
            failures = summary.failed.len(),
            delay_ms = delay.as_millis() as u64,
            "load run failed with transient errors, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

fn log_failures(report: &RunReport) {
    for failed in &report.failed {
        let policy = build_error_handling_policy(&failed.error);
        error!(
            file = %failed.source_key,
            stage = %failed.stage,
            partial_publish = failed.partial_publish(),
            retry = ?policy.retry_directive(),
            solution = policy.solution().unwrap_or_default(),
            "file failed"
        );
    }
}

async fn rollback<S>(
    config: &RunnerConfig,
    store: S,
    dimension: &str,
    force: bool,
) -> RunnerResult<()>
where
    S: ObjectStore,
{
    if !config.loader.dimensions.iter().any(|name| name == dimension) {
        return Err(etl_error!(
            ErrorKind::ConfigError,
            "Unknown dimension",
            format!(
                "`{dimension}` is not one of the configured dimensions [{}]",
                config.loader.dimensions.join(", ")
            )
        )
        .into());
    }

    let dimensions = DimensionStore::new(store, Layout::new(&config.layout));
    let table = dimensions.rollback(dimension, force).await?;

    info!(
        dimension,
        entries = table.len(),
        "restored the previous dimension version"
    );

    Ok(())
}
