use serde_json::json;
use taxi_config::shared::LoaderConfig;
use taxi_etl::error::ErrorKind;
use taxi_etl::layout::{Layout, RawStatus, SourceKind};
use taxi_etl::publish::{PublishCoordinator, PublishStage};
use taxi_etl::store::ObjectStore;
use taxi_etl::store::memory::MemoryStore;
use taxi_etl::test_utils::fixtures::{
    date, dimension, pairs, put_pending, taxi_file, taxi_trips, weather_file,
};
use taxi_etl::test_utils::store::{FaultInjectingStore, StoreOperation};
use taxi_telemetry::tracing::init_test_tracing;

const DIM_PAYMENT_TYPE: &str = "transformed_data/dim_payment_type/dim_payment_type.csv";
const DIM_PAYMENT_TYPE_BACKUP: &str =
    "transformed_data/dim_payment_type_previous_versions/dim_payment_type.csv";
const DIM_COMPANY_BACKUP: &str = "transformed_data/dim_company_previous_versions/dim_company.csv";

fn coordinator<S: ObjectStore + Clone>(store: S) -> PublishCoordinator<S> {
    PublishCoordinator::new(LoaderConfig::default(), Layout::default(), store)
}

fn owned(pairs: &[(u64, &str)]) -> Vec<(u64, String)> {
    pairs
        .iter()
        .map(|(key, value)| (*key, (*value).to_owned()))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn first_run_publishes_dimensions_facts_and_archives_raw_files() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    let day = date(2024, 1, 15);

    let taxi_key = put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        day,
        taxi_file(&taxi_trips(
            day,
            &[
                ("Credit Card", "Flash Cab"),
                ("Cash", "Sun Taxi"),
                ("Credit Card", "Flash Cab"),
            ],
        )),
    )
    .await;
    let weather_key =
        put_pending(&store, &layout, SourceKind::Weather, day, weather_file(day, 24)).await;

    let report = coordinator(store.clone()).run().await.unwrap();

    assert!(report.is_success(), "{report}");
    assert_eq!(report.processed.len(), 2);
    assert_eq!(report.processed[0].rows, 3);
    assert_eq!(
        report.processed[0].new_dimension_values.get("payment_type"),
        Some(&2)
    );
    assert_eq!(report.processed[1].rows, 24);

    // Dimensions hold the values in first-seen order and no backup exists yet.
    assert_eq!(
        store.text(DIM_PAYMENT_TYPE).await.as_deref(),
        Some("payment_type_id,payment_type\n1,Credit Card\n2,Cash\n")
    );
    assert!(!store.exists(DIM_PAYMENT_TYPE_BACKUP).await.unwrap());

    // Facts carry key columns instead of the raw categorical columns.
    let facts = store
        .text("transformed_data/fact_taxi_trips/taxi_2024-01-15.csv")
        .await
        .unwrap();
    let mut lines = facts.lines();
    assert_eq!(
        lines.next(),
        Some(
            "trip_id,taxi_id,trip_start_timestamp,trip_end_timestamp,trip_seconds,trip_miles,\
             pickup_community_area_id,dropoff_community_area_id,fare,tips,tolls,extras,trip_total,\
             pickup_centroid_latitude,pickup_centroid_longitude,dropoff_centroid_latitude,\
             dropoff_centroid_longitude,datetime_for_weather,payment_type_id,company_id"
        )
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].starts_with("2024-01-15-0,taxi-2024-01-15-0,2024-01-15 00:30:00,"));
    assert!(rows[0].ends_with(",2024-01-15 00:00:00,1,1"));
    assert!(rows[1].ends_with(",2024-01-15 01:00:00,2,2"));

    let weather = store
        .text("transformed_data/dim_weather/weather_2024-01-15.csv")
        .await
        .unwrap();
    assert!(weather.starts_with("datetime,temperature,wind_speed,rain,precipitation\n"));
    assert!(weather.contains("\n2024-01-15 23:00:00,"));

    // Raw files moved to the processed area.
    for (kind, key) in [(SourceKind::Taxi, &taxi_key), (SourceKind::Weather, &weather_key)] {
        assert!(!store.exists(key).await.unwrap());
        let archived = layout.archive_key_for(kind, key).unwrap();
        assert!(store.exists(&archived).await.unwrap());
    }
    assert!(
        store
            .list(&layout.raw_dir(RawStatus::Pending, SourceKind::Taxi))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn new_values_are_appended_and_previous_version_is_kept() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    let coordinator = coordinator(store.clone());
    coordinator
        .dimensions()
        .publish(&dimension("payment_type", &[(1, "Cash"), (2, "Credit Card")]))
        .await
        .unwrap();
    coordinator
        .dimensions()
        .publish(&dimension("company", &[(1, "Flash Cab")]))
        .await
        .unwrap();

    let day = date(2024, 1, 16);
    put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        day,
        taxi_file(&taxi_trips(
            day,
            &[("Cash", "Flash Cab"), ("Cash", "Flash Cab"), ("Mobile", "Flash Cab")],
        )),
    )
    .await;

    let report = coordinator.run().await.unwrap();

    assert!(report.is_success(), "{report}");
    let processed = &report.processed[0];
    assert_eq!(processed.new_dimension_values.get("payment_type"), Some(&1));
    assert_eq!(processed.new_dimension_values.get("company"), Some(&0));

    let snapshot = coordinator
        .dimensions()
        .load_snapshot("payment_type")
        .await
        .unwrap();
    assert_eq!(
        pairs(&snapshot.current),
        owned(&[(1, "Cash"), (2, "Credit Card"), (3, "Mobile")])
    );
    assert_eq!(
        snapshot.previous.as_ref().map(pairs),
        Some(owned(&[(1, "Cash"), (2, "Credit Card")]))
    );

    // Unchanged dimensions are neither backed up nor rewritten.
    assert!(!store.exists(DIM_COMPANY_BACKUP).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn processing_the_same_file_again_adds_no_keys() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    let coordinator = coordinator(store.clone());
    let day = date(2024, 1, 15);
    let raw = taxi_file(&taxi_trips(day, &[("Cash", "Flash Cab"), ("Mobile", "Sun Taxi")]));

    put_pending(&store, &layout, SourceKind::Taxi, day, raw.clone()).await;
    coordinator.run().await.unwrap();
    let first_payment_types = store.text(DIM_PAYMENT_TYPE).await;
    let first_facts = store
        .text("transformed_data/fact_taxi_trips/taxi_2024-01-15.csv")
        .await;

    put_pending(&store, &layout, SourceKind::Taxi, day, raw).await;
    let report = coordinator.run().await.unwrap();

    assert!(report.is_success(), "{report}");
    assert_eq!(
        report.processed[0].new_dimension_values.values().sum::<usize>(),
        0
    );
    assert_eq!(store.text(DIM_PAYMENT_TYPE).await, first_payment_types);
    assert_eq!(
        store
            .text("transformed_data/fact_taxi_trips/taxi_2024-01-15.csv")
            .await,
        first_facts
    );
    // A rerun without new values leaves the previous-version slot alone.
    assert!(!store.exists(DIM_PAYMENT_TYPE_BACKUP).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn keys_only_grow_across_runs_and_files() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    let coordinator = coordinator(store.clone());

    let first_day = date(2024, 1, 15);
    put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        first_day,
        taxi_file(&taxi_trips(first_day, &[("Cash", "A"), ("Card", "B")])),
    )
    .await;
    coordinator.run().await.unwrap();
    let after_first = pairs(
        &coordinator
            .dimensions()
            .load_current("company")
            .await
            .unwrap(),
    );

    // Two files in one run: the second sees the keys the first one published.
    for (day, companies) in [
        (date(2024, 1, 16), ["C", "A"]),
        (date(2024, 1, 17), ["D", "C"]),
    ] {
        put_pending(
            &store,
            &layout,
            SourceKind::Taxi,
            day,
            taxi_file(&taxi_trips(
                day,
                &[("Cash", companies[0]), ("Cash", companies[1])],
            )),
        )
        .await;
    }
    let report = coordinator.run().await.unwrap();

    assert!(report.is_success(), "{report}");
    let after_second = pairs(
        &coordinator
            .dimensions()
            .load_current("company")
            .await
            .unwrap(),
    );
    assert_eq!(after_second, owned(&[(1, "A"), (2, "B"), (3, "C"), (4, "D")]));
    assert_eq!(&after_second[..after_first.len()], after_first.as_slice());
    let keys: Vec<u64> = after_second.iter().map(|(key, _)| *key).collect();
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test(flavor = "multi_thread")]
async fn a_failing_file_does_not_prevent_other_files_from_publishing() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    let coordinator = coordinator(store.clone());

    // The first file already carries a key column, which enrichment refuses to overwrite.
    let bad_day = date(2024, 1, 14);
    let mut bad_trips = taxi_trips(bad_day, &[("Prcard", "Blue Diamond")]);
    bad_trips[0]["payment_type_id"] = json!("99");
    let bad_key = put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        bad_day,
        taxi_file(&bad_trips),
    )
    .await;

    let good_day = date(2024, 1, 15);
    put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        good_day,
        taxi_file(&taxi_trips(good_day, &[("Cash", "Flash Cab")])),
    )
    .await;

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.failed.len(), 1);
    let failed = &report.failed[0];
    assert_eq!(failed.source_key, bad_key);
    assert_eq!(failed.stage, PublishStage::Enrich);
    assert_eq!(failed.error.kind(), ErrorKind::IntegrityError);
    assert!(!failed.partial_publish());

    // Nothing of the failed file was written and it stays pending.
    assert!(store.exists(&bad_key).await.unwrap());
    assert!(
        !store
            .exists("transformed_data/fact_taxi_trips/taxi_2024-01-14.csv")
            .await
            .unwrap()
    );
    assert!(
        store
            .exists("transformed_data/fact_taxi_trips/taxi_2024-01-15.csv")
            .await
            .unwrap()
    );
    assert_eq!(
        store.text(DIM_PAYMENT_TYPE).await.as_deref(),
        Some("payment_type_id,payment_type\n1,Cash\n")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupted_dimension_fails_taxi_files_but_not_weather() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    store
        .put(
            DIM_PAYMENT_TYPE,
            "payment_type_id,payment_type\n1,Cash\n2,Cash\n".into(),
        )
        .await
        .unwrap();
    let day = date(2024, 1, 15);
    put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        day,
        taxi_file(&taxi_trips(day, &[("Cash", "Flash Cab")])),
    )
    .await;
    put_pending(&store, &layout, SourceKind::Weather, day, weather_file(day, 3)).await;

    let report = coordinator(store.clone()).run().await.unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].stage, PublishStage::Reconcile);
    assert_eq!(report.failed[0].error.kind(), ErrorKind::IntegrityError);
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].kind, SourceKind::Weather);
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_weather_file_is_reported_without_blocking_taxi_files() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    let day = date(2024, 1, 15);
    put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        day,
        taxi_file(&taxi_trips(day, &[("Cash", "Flash Cab")])),
    )
    .await;
    let weather_key = put_pending(
        &store,
        &layout,
        SourceKind::Weather,
        day,
        json!({"hourly": {"time": ["2024-01-15T00:00"], "temperature_2m": [],
            "wind_speed_10m": [], "rain": [], "precipitation": []}})
        .to_string()
        .into(),
    )
    .await;

    let report = coordinator(store.clone()).run().await.unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.failed[0].source_key, weather_key);
    assert_eq!(report.failed[0].stage, PublishStage::Transform);
    assert_eq!(report.failed[0].error.kind(), ErrorKind::InvalidData);
    assert!(store.exists(&weather_key).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_raw_file_is_empty_input() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    let day = date(2024, 1, 15);
    put_pending(&store, &layout, SourceKind::Taxi, day, taxi_file(&[])).await;

    let report = coordinator(store.clone()).run().await.unwrap();

    assert_eq!(report.failed[0].error.kind(), ErrorKind::EmptyInput);
    assert_eq!(report.failed[0].stage, PublishStage::Transform);
    assert!(!store.exists(DIM_PAYMENT_TYPE).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn run_without_pending_files_is_an_empty_success() {
    init_test_tracing();
    let store = MemoryStore::new();
    store
        .put("raw_data/pending/taxi/README.md", "not a raw file".into())
        .await
        .unwrap();

    let report = coordinator(store).run().await.unwrap();

    assert!(report.is_success());
    assert!(report.processed.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn storage_failure_while_publishing_dimensions_is_a_partial_publish() {
    init_test_tracing();
    let store = FaultInjectingStore::new(MemoryStore::new());
    let layout = Layout::default();
    let coordinator = coordinator(store.clone());
    let day = date(2024, 1, 15);
    let key = put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        day,
        taxi_file(&taxi_trips(day, &[("Cash", "Flash Cab"), ("Card", "Sun Taxi")])),
    )
    .await;
    store.fail_always(StoreOperation::Put, "dim_company/");

    let report = coordinator.run().await.unwrap();

    let failed = &report.failed[0];
    assert_eq!(failed.stage, PublishStage::PublishDimensions);
    assert_eq!(failed.error.kind(), ErrorKind::StorageError);
    assert!(failed.partial_publish());
    assert_eq!(report.partial_publishes().count(), 1);
    // The first dimension was published before the failure, no facts were.
    assert!(store.exists(DIM_PAYMENT_TYPE).await.unwrap());
    assert!(
        !store
            .exists("transformed_data/fact_taxi_trips/taxi_2024-01-15.csv")
            .await
            .unwrap()
    );
    assert!(store.exists(&key).await.unwrap());

    // Once storage recovers, the next run completes the file with the same keys.
    store.clear();
    let report = coordinator.run().await.unwrap();

    assert!(report.is_success(), "{report}");
    assert_eq!(
        report.processed[0].new_dimension_values.get("payment_type"),
        Some(&0)
    );
    assert_eq!(
        report.processed[0].new_dimension_values.get("company"),
        Some(&2)
    );
    assert_eq!(
        store.inner().text(DIM_PAYMENT_TYPE).await.as_deref(),
        Some("payment_type_id,payment_type\n1,Cash\n2,Card\n")
    );
    assert!(!store.exists(&key).await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn listing_failure_of_one_kind_is_reported_and_other_kind_runs() {
    init_test_tracing();
    let store = FaultInjectingStore::new(MemoryStore::new());
    let layout = Layout::default();
    let day = date(2024, 1, 15);
    put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        day,
        taxi_file(&taxi_trips(day, &[("Cash", "Flash Cab")])),
    )
    .await;
    put_pending(&store, &layout, SourceKind::Weather, day, weather_file(day, 2)).await;
    store.fail_always(StoreOperation::List, "pending/weather");

    let report = coordinator(store.clone()).run().await.unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].kind, SourceKind::Taxi);
    assert_eq!(report.failed[0].kind, SourceKind::Weather);
    assert_eq!(report.failed[0].stage, PublishStage::Load);
    assert_eq!(report.failed[0].source_key, "raw_data/pending/weather/");
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_rollback_keeps_published_keys_from_being_reused() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    let coordinator = coordinator(store.clone());

    for (day, payment) in [(date(2024, 1, 14), "Cash"), (date(2024, 1, 15), "Mobile")] {
        put_pending(
            &store,
            &layout,
            SourceKind::Taxi,
            day,
            taxi_file(&taxi_trips(day, &[(payment, "Flash Cab")])),
        )
        .await;
        let report = coordinator.run().await.unwrap();
        assert!(report.is_success(), "{report}");
    }

    // `Mobile` -> 2 is referenced by the facts of 2024-01-15, so it cannot be withdrawn.
    let err = coordinator
        .dimensions()
        .rollback("payment_type", false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IntegrityError);

    let day = date(2024, 1, 16);
    put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        day,
        taxi_file(&taxi_trips(day, &[("Prcard", "Flash Cab")])),
    )
    .await;
    let report = coordinator.run().await.unwrap();
    assert!(report.is_success(), "{report}");

    let current = coordinator
        .dimensions()
        .load_current("payment_type")
        .await
        .unwrap();
    assert_eq!(
        pairs(&current),
        owned(&[(1, "Cash"), (2, "Mobile"), (3, "Prcard")])
    );
    let facts = store
        .text("transformed_data/fact_taxi_trips/taxi_2024-01-16.csv")
        .await
        .unwrap();
    assert!(facts.lines().nth(1).unwrap().ends_with(",3,1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn community_area_key_column_in_raw_file_fails_before_any_write() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    let day = date(2024, 1, 15);
    let mut trips = taxi_trips(day, &[("Cash", "Flash Cab")]);
    trips[0]["pickup_community_area_id"] = json!("8");
    let key = put_pending(&store, &layout, SourceKind::Taxi, day, taxi_file(&trips)).await;

    let report = coordinator(store.clone()).run().await.unwrap();

    assert!(report.processed.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].stage, PublishStage::Transform);
    assert_eq!(report.failed[0].error.kind(), ErrorKind::IntegrityError);
    assert!(!report.failed[0].partial_publish());
    assert!(store.exists(&key).await.unwrap());
    assert!(
        !store
            .exists("transformed_data/fact_taxi_trips/taxi_2024-01-15.csv")
            .await
            .unwrap()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unreadable_dimension_fails_each_pending_taxi_file_at_load() {
    init_test_tracing();
    let store = MemoryStore::new();
    let layout = Layout::default();
    store
        .put(DIM_PAYMENT_TYPE, "not,a,dimension\n".into())
        .await
        .unwrap();
    let mut taxi_keys = Vec::new();
    for day in [date(2024, 1, 15), date(2024, 1, 16)] {
        let key = put_pending(
            &store,
            &layout,
            SourceKind::Taxi,
            day,
            taxi_file(&taxi_trips(day, &[("Cash", "Flash Cab")])),
        )
        .await;
        taxi_keys.push(key);
    }
    let day = date(2024, 1, 15);
    put_pending(&store, &layout, SourceKind::Weather, day, weather_file(day, 3)).await;

    let report = coordinator(store.clone()).run().await.unwrap();

    let failed_keys: Vec<&str> = report
        .failed
        .iter()
        .map(|file| file.source_key.as_str())
        .collect();
    assert_eq!(failed_keys, taxi_keys);
    for file in &report.failed {
        assert_eq!(file.kind, SourceKind::Taxi);
        assert_eq!(file.stage, PublishStage::Load);
        assert_eq!(file.error.kind(), ErrorKind::MissingColumn);
        assert!(!file.partial_publish());
    }
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].kind, SourceKind::Weather);
}
