use taxi_config::shared::LoaderConfig;
use taxi_etl::error::ErrorKind;
use taxi_etl::failpoints::{
    ARCHIVE_AFTER_COPY_FP, PUBLISH_AFTER_DIMENSION_PUBLISH_FP, PUBLISH_AFTER_FACT_PUBLISH_FP,
    PUBLISH_BEFORE_BACKUP_FP,
};
use taxi_etl::layout::{Layout, SourceKind};
use taxi_etl::policy::{RetryDirective, build_error_handling_policy};
use taxi_etl::publish::{PublishCoordinator, PublishStage};
use taxi_etl::store::ObjectStore;
use taxi_etl::store::memory::MemoryStore;
use taxi_etl::test_utils::failpoints::CustomFailScenario;
use taxi_etl::test_utils::fixtures::{date, put_pending, taxi_file, taxi_trips};
use taxi_telemetry::tracing::init_test_tracing;

const FACTS: &str = "transformed_data/fact_taxi_trips/taxi_2024-01-15.csv";
const DIM_COMPANY: &str = "transformed_data/dim_company/dim_company.csv";

async fn seeded_store() -> (MemoryStore, String) {
    let store = MemoryStore::new();
    let day = date(2024, 1, 15);
    let key = put_pending(
        &store,
        &Layout::default(),
        SourceKind::Taxi,
        day,
        taxi_file(&taxi_trips(
            day,
            &[("Cash", "Flash Cab"), ("Mobile", "Sun Taxi"), ("Cash", "Sun Taxi")],
        )),
    )
    .await;

    (store, key)
}

fn coordinator(store: MemoryStore) -> PublishCoordinator<MemoryStore> {
    PublishCoordinator::new(LoaderConfig::default(), Layout::default(), store)
}

#[tokio::test(flavor = "multi_thread")]
async fn crash_before_backup_leaves_no_trace() {
    init_test_tracing();
    let (store, key) = seeded_store().await;
    let before = store.objects().await;

    let scenario = CustomFailScenario::setup(&[(PUBLISH_BEFORE_BACKUP_FP, "return(no_retry)")]);
    let report = coordinator(store.clone()).run().await.unwrap();
    scenario.teardown();

    let failed = &report.failed[0];
    assert_eq!(failed.stage, PublishStage::Backup);
    assert_eq!(failed.error.kind(), ErrorKind::WithNoRetry);
    assert_eq!(store.objects().await, before);
    assert!(store.exists(&key).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn crash_after_dimension_publish_is_completed_by_the_next_run() {
    init_test_tracing();
    let (store, key) = seeded_store().await;

    let report = {
        let _scenario = CustomFailScenario::setup(&[(
            PUBLISH_AFTER_DIMENSION_PUBLISH_FP,
            "return(timed_retry)",
        )]);
        coordinator(store.clone()).run().await.unwrap()
    };

    let failed = &report.failed[0];
    assert_eq!(failed.stage, PublishStage::PublishDimensions);
    assert!(failed.partial_publish());
    assert_eq!(
        build_error_handling_policy(&failed.error).retry_directive(),
        RetryDirective::Timed
    );
    let companies = store.text(DIM_COMPANY).await;
    assert_eq!(
        companies.as_deref(),
        Some("company_id,company\n1,Flash Cab\n2,Sun Taxi\n")
    );
    assert!(!store.exists(FACTS).await.unwrap());

    // The retry finds the values already published and assigns no new keys.
    let report = coordinator(store.clone()).run().await.unwrap();

    assert!(report.is_success(), "{report}");
    assert_eq!(
        report.processed[0]
            .new_dimension_values
            .values()
            .sum::<usize>(),
        0
    );
    assert_eq!(store.text(DIM_COMPANY).await, companies);
    assert!(store.exists(FACTS).await.unwrap());
    assert!(!store.exists(&key).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn crash_after_fact_publish_rewrites_the_same_output() {
    init_test_tracing();
    let (store, key) = seeded_store().await;

    {
        let _scenario =
            CustomFailScenario::setup(&[(PUBLISH_AFTER_FACT_PUBLISH_FP, "return(manual_retry)")]);
        let report = coordinator(store.clone()).run().await.unwrap();
        assert_eq!(report.failed[0].stage, PublishStage::PublishFacts);
        assert_eq!(report.failed[0].error.kind(), ErrorKind::WithManualRetry);
    }
    let facts = store.text(FACTS).await;
    assert!(facts.is_some());
    assert!(store.exists(&key).await.unwrap());

    let report = coordinator(store.clone()).run().await.unwrap();

    assert!(report.is_success(), "{report}");
    assert_eq!(store.text(FACTS).await, facts);
}

#[tokio::test(flavor = "multi_thread")]
async fn crash_between_archive_copy_and_delete_is_reprocessed() {
    init_test_tracing();
    let (store, key) = seeded_store().await;
    let archived = Layout::default()
        .archive_key_for(SourceKind::Taxi, &key)
        .unwrap();

    {
        let _scenario = CustomFailScenario::setup(&[(ARCHIVE_AFTER_COPY_FP, "return")]);
        let report = coordinator(store.clone()).run().await.unwrap();
        assert_eq!(report.failed[0].stage, PublishStage::Archive);
    }
    // The raw file now exists in both areas.
    assert!(store.exists(&key).await.unwrap());
    assert!(store.exists(&archived).await.unwrap());
    let companies = store.text(DIM_COMPANY).await;

    let report = coordinator(store.clone()).run().await.unwrap();

    assert!(report.is_success(), "{report}");
    assert!(!store.exists(&key).await.unwrap());
    assert!(store.exists(&archived).await.unwrap());
    assert_eq!(store.text(DIM_COMPANY).await, companies);
}
