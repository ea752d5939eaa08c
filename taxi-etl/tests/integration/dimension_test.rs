use taxi_etl::dimension::{DimensionStore, reconcile};
use taxi_etl::enrich::enrich;
use taxi_etl::error::ErrorKind;
use taxi_etl::layout::Layout;
use taxi_etl::store::memory::MemoryStore;
use taxi_etl::test_utils::fixtures::{dimension, pairs};
use taxi_etl::types::{Batch, Cell, TableRow};
use taxi_telemetry::tracing::init_test_tracing;

fn payments(values: &[&str]) -> Batch {
    Batch::with_rows(
        vec!["trip_id".to_owned(), "payment_type".to_owned()],
        values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                TableRow::new(vec![Cell::from(format!("t{index}")), Cell::from(*value)])
            })
            .collect(),
    )
    .unwrap()
}

fn owned(pairs: &[(u64, &str)]) -> Vec<(u64, String)> {
    pairs
        .iter()
        .map(|(key, value)| (*key, (*value).to_owned()))
        .collect()
}

#[test]
fn new_value_gets_the_next_key_after_existing_ones() {
    init_test_tracing();
    let current = dimension("payment_type", &[(1, "cash"), (2, "credit")]);

    let updated = reconcile(
        &payments(&["cash", "cash", "mobile"]),
        &current,
        "payment_type",
        1,
    )
    .unwrap();

    assert_eq!(
        pairs(&updated),
        owned(&[(1, "cash"), (2, "credit"), (3, "mobile")])
    );
}

#[test]
fn empty_table_starts_at_the_start_offset() {
    init_test_tracing();
    let current = dimension("payment_type", &[]);

    let updated = reconcile(&payments(&["A", "B", "A"]), &current, "payment_type", 1).unwrap();

    assert_eq!(pairs(&updated), owned(&[(1, "A"), (2, "B")]));
}

#[test]
fn enrichment_with_a_stale_table_fails_instead_of_dropping_rows() {
    init_test_tracing();
    let facts = payments(&["cash", "mobile", "cash"]);
    let stale = dimension("payment_type", &[(1, "cash"), (2, "credit")]);

    let err = enrich(
        &facts,
        &[("payment_type".to_owned(), stale)].into_iter().collect(),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnmatchedDimensionValue);
    assert!(err.detail().unwrap().contains("`mobile`"));
}

#[test]
fn reconciled_table_enriches_every_row() {
    init_test_tracing();
    let facts = payments(&["credit", "mobile", "cash", "mobile"]);
    let current = dimension("payment_type", &[(1, "cash"), (2, "credit")]);

    let updated = reconcile(&facts, &current, "payment_type", 1).unwrap();
    let enriched = enrich(
        &facts,
        &[("payment_type".to_owned(), updated)].into_iter().collect(),
    )
    .unwrap();

    assert_eq!(enriched.len(), facts.len());
    assert_eq!(enriched.columns(), ["trip_id", "payment_type_id"]);
    let keys: Vec<Cell> = enriched
        .column_values("payment_type_id")
        .unwrap()
        .cloned()
        .collect();
    assert_eq!(
        keys,
        vec![Cell::I64(2), Cell::I64(3), Cell::I64(1), Cell::I64(3)]
    );
}

#[tokio::test]
async fn forced_rollback_restores_the_table_before_the_last_publish() {
    init_test_tracing();
    let dimensions = DimensionStore::new(MemoryStore::new(), Layout::default());
    let first = dimension("company", &[(1, "Flash Cab")]);
    let second = dimension("company", &[(1, "Flash Cab"), (2, "Sun Taxi")]);

    dimensions.publish(&first).await.unwrap();
    dimensions.backup("company").await.unwrap();
    dimensions.publish(&second).await.unwrap();

    let restored = dimensions.rollback("company", true).await.unwrap();

    assert_eq!(restored, first);
    let snapshot = dimensions.load_snapshot("company").await.unwrap();
    assert_eq!(snapshot.current, first);
    assert_eq!(snapshot.previous, Some(first));
}
