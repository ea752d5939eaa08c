use taxi_config::shared::LoaderConfig;
use taxi_etl::layout::{Layout, SourceKind};
use taxi_etl::publish::PublishCoordinator;
use taxi_etl::store::local::LocalStore;
use taxi_etl::test_utils::fixtures::{date, put_pending, taxi_file, taxi_trips, weather_file};
use taxi_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn run_against_a_directory_tree() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    let layout = Layout::default();
    let day = date(2024, 2, 1);
    put_pending(
        &store,
        &layout,
        SourceKind::Taxi,
        day,
        taxi_file(&taxi_trips(day, &[("Cash", "Flash Cab"), ("Mobile", "Flash Cab")])),
    )
    .await;
    put_pending(&store, &layout, SourceKind::Weather, day, weather_file(day, 24)).await;

    let coordinator = PublishCoordinator::new(LoaderConfig::default(), layout, store);
    let report = coordinator.run().await.unwrap();

    assert!(report.is_success(), "{report}");
    let root = dir.path();
    assert!(root.join("transformed_data/fact_taxi_trips/taxi_2024-02-01.csv").is_file());
    assert!(root.join("transformed_data/dim_weather/weather_2024-02-01.csv").is_file());
    assert_eq!(
        std::fs::read_to_string(root.join("transformed_data/dim_company/dim_company.csv"))
            .unwrap(),
        "company_id,company\n1,Flash Cab\n"
    );
    assert!(!root.join("raw_data/pending/taxi/taxi_2024-02-01.json").exists());
    assert!(root.join("raw_data/processed/taxi/taxi_2024-02-01.json").is_file());
    assert!(root.join("raw_data/processed/weather/weather_2024-02-01.json").is_file());
}
