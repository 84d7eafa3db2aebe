//! Load pipeline tests against the in-memory store
//!
//! These cover the end-to-end behavior of a load from a CSV on disk:
//! - Idempotent reloads and duplicate rows
//! - Schema gate and empty input
//! - Column order independence
//! - Failure and cancellation between batches

mod common;

use common::{init_test_tracing, patient_rows, CsvFixture, BOBBY, DANNY, HEADER, LESLIE};
use medload_ingest::observer::{CountPhase, MigrationObserver, ObservedEvent};
use medload_ingest::upsert::BatchOutcome;
use medload_ingest::{
    prepare, IngestError, InMemoryStore, MigrationPipeline, NoopObserver, PreparedLoad,
    RecordingObserver, SourceTable,
};
use mongodb::bson::Bson;
use tokio_util::sync::CancellationToken;

fn load_fixture(fixture: &CsvFixture) -> PreparedLoad {
    let table = SourceTable::from_path(fixture.path()).expect("Failed to read fixture");
    prepare(&table, &NoopObserver).expect("Failed to prepare fixture")
}

fn patients(n: usize) -> CsvFixture {
    let rows = patient_rows(n);
    let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
    CsvFixture::admissions(&rows)
}

// ============================================================================
// Idempotency
// ============================================================================

#[tokio::test]
async fn test_duplicate_row_collapses_to_one_document() {
    init_test_tracing();
    let fixture = CsvFixture::admissions(&[BOBBY, LESLIE, BOBBY]);
    let load = load_fixture(&fixture);
    let store = InMemoryStore::new();

    assert_eq!(load.stats.rows_read, 3);
    assert_eq!(load.stats.duplicate_rows, 1);
    assert_eq!(load.stats.distinct_identities, 2);

    let report = MigrationPipeline::new(&store, 5000)
        .run(&load, &NoopObserver)
        .await
        .unwrap();

    assert_eq!(report.documents_before, 0);
    assert_eq!(report.documents_after, 2);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_rows_differing_only_by_name_stay_distinct() {
    let renamed = BOBBY.replacen("Bobby Jackson", "Robert Jackson", 1);
    let fixture = CsvFixture::admissions(&[BOBBY, renamed.as_str(), BOBBY]);
    let load = load_fixture(&fixture);
    let store = InMemoryStore::new();

    let report = MigrationPipeline::new(&store, 5000)
        .run(&load, &NoopObserver)
        .await
        .unwrap();

    assert_ne!(load.records[0].record_id, load.records[1].record_id);
    assert_eq!(load.records[0].record_id, load.records[2].record_id);
    assert_eq!(report.summary.upserted, 2);
    assert_eq!(report.summary.matched, 1);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_reload_leaves_collection_unchanged() {
    let fixture = CsvFixture::admissions(&[BOBBY, LESLIE, DANNY]);
    let load = load_fixture(&fixture);
    let store = InMemoryStore::new();
    let pipeline = MigrationPipeline::new(&store, 2);

    let first = pipeline.run(&load, &NoopObserver).await.unwrap();
    let snapshot: Vec<_> = load
        .records
        .iter()
        .map(|r| store.document(&r.record_id).unwrap())
        .collect();

    let second = pipeline.run(&load, &NoopObserver).await.unwrap();

    assert_eq!(first.summary.upserted, 3);
    assert_eq!(second.summary.upserted, 0);
    assert_eq!(second.summary.matched, 3);
    assert_eq!(second.summary.modified, 0);
    assert_eq!(second.documents_before, second.documents_after);
    assert_eq!(store.len(), 3);

    for (record, before) in load.records.iter().zip(snapshot) {
        assert_eq!(store.document(&record.record_id).unwrap(), before);
    }
}

#[tokio::test]
async fn test_identities_stable_across_batch_sizes() {
    let fixture = patients(11);
    let load = load_fixture(&fixture);

    let small = InMemoryStore::new();
    let large = InMemoryStore::new();
    MigrationPipeline::new(&small, 2)
        .run(&load, &NoopObserver)
        .await
        .unwrap();
    MigrationPipeline::new(&large, 5000)
        .run(&load, &NoopObserver)
        .await
        .unwrap();

    assert_eq!(small.record_ids(), large.record_ids());
}

// ============================================================================
// Schema and Input Shape
// ============================================================================

#[tokio::test]
async fn test_missing_column_rejected_before_any_write() {
    let header = HEADER.replace(",Doctor,", ",Physician,");
    let fixture = CsvFixture::with_header(&header, &[BOBBY]);
    let table = SourceTable::from_path(fixture.path()).unwrap();

    let err = prepare(&table, &NoopObserver).unwrap_err();

    match &err {
        IngestError::Schema { missing } => assert_eq!(missing, &vec!["Doctor".to_string()]),
        other => panic!("expected schema error, got {other:?}"),
    }
    assert!(err.to_string().contains("Doctor"));
}

#[tokio::test]
async fn test_empty_input_succeeds_without_writes() {
    let fixture = CsvFixture::admissions(&[]);
    let load = load_fixture(&fixture);
    let store = InMemoryStore::new();
    let observer = RecordingObserver::new();

    let report = MigrationPipeline::new(&store, 100)
        .run(&load, &observer)
        .await
        .unwrap();

    assert!(load.records.is_empty());
    assert!(observer.saw_empty_input());
    assert_eq!(report.summary.batches, 0);
    assert_eq!(report.documents_after, 0);
    assert_eq!(store.bulk_write_calls(), 0);
    assert_eq!(store.index_names().len(), 6);
}

#[tokio::test]
async fn test_column_order_and_extra_columns_do_not_change_identity() {
    let reorder = |line: &str| -> String {
        let mut cells: Vec<&str> = line.split(',').collect();
        cells.reverse();
        cells.insert(0, "extra");
        cells.join(",")
    };
    let header = reorder(HEADER).replacen("extra", "Notes", 1);
    let row = reorder(BOBBY);

    let shuffled = load_fixture(&CsvFixture::with_header(&header, &[&row]));
    let canonical = load_fixture(&CsvFixture::admissions(&[BOBBY]));

    assert_eq!(shuffled.records[0].record_id, canonical.records[0].record_id);
    assert_eq!(shuffled.records[0].record, canonical.records[0].record);
    assert!(shuffled.records[0].to_document().get("Notes").is_none());
}

#[tokio::test]
async fn test_malformed_values_stored_as_null() {
    let row = "Jane Roe,N/A,Female,AB+,Flu,31/31/2024,Dr. House,Princeton,Aetna,lots,not-a-room,Urgent,,Tamiflu,Normal";
    let fixture = CsvFixture::admissions(&[row]);
    let table = SourceTable::from_path(fixture.path()).unwrap();
    let observer = RecordingObserver::new();
    let load = prepare(&table, &observer).unwrap();

    // Empty discharge date is absent without a warning
    let warned: Vec<&str> = observer
        .warnings()
        .iter()
        .map(|w| w.field.column())
        .collect();
    assert_eq!(
        warned,
        vec!["Age", "Date of Admission", "Billing Amount", "Room Number"]
    );
    assert!(observer.warnings().iter().all(|w| w.line == 2));

    let store = InMemoryStore::new();
    MigrationPipeline::new(&store, 10)
        .run(&load, &NoopObserver)
        .await
        .unwrap();

    let stored = store.document(&load.records[0].record_id).unwrap();
    for key in [
        "age",
        "date_of_admission",
        "billing_amount",
        "room_number",
        "discharge_date",
    ] {
        assert_eq!(stored.get(key), Some(&Bson::Null), "{key} should be null");
    }
    assert_eq!(stored.get_str("name").unwrap(), "Jane Roe");
}

// ============================================================================
// Batching, Failures and Cancellation
// ============================================================================

#[tokio::test]
async fn test_batches_partition_input() {
    let fixture = patients(7);
    let load = load_fixture(&fixture);
    let store = InMemoryStore::new();
    let observer = RecordingObserver::new();

    let report = MigrationPipeline::new(&store, 3)
        .run(&load, &observer)
        .await
        .unwrap();

    let sizes: Vec<usize> = observer.batches().iter().map(|b| b.size).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(report.summary.batches, 3);
    assert_eq!(report.summary.records, 7);
    assert_eq!(store.bulk_write_calls(), 3);
    assert_eq!(store.len(), 7);
    assert!(observer.events().contains(&ObservedEvent::UpsertStarted {
        records: 7,
        batches: 3
    }));
}

#[tokio::test]
async fn test_connectivity_failure_keeps_committed_batches() {
    let fixture = patients(7);
    let load = load_fixture(&fixture);
    let store = InMemoryStore::new();
    store.fail_on_bulk_write(2);
    let observer = RecordingObserver::new();

    let err = MigrationPipeline::new(&store, 3)
        .run(&load, &observer)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Connectivity(_)));
    assert_eq!(store.len(), 3);
    assert_eq!(observer.batches().len(), 1);
    assert!(!observer
        .events()
        .iter()
        .any(|e| matches!(e, ObservedEvent::DocumentCount(CountPhase::AfterLoad, _))));

    // A clean re-run completes the load
    store.fail_on_bulk_write(usize::MAX);
    let report = MigrationPipeline::new(&store, 3)
        .run(&load, &NoopObserver)
        .await
        .unwrap();
    assert_eq!(report.documents_before, 3);
    assert_eq!(report.documents_after, 7);
}

#[tokio::test]
async fn test_rejected_record_does_not_block_others() {
    let fixture = CsvFixture::admissions(&[BOBBY, LESLIE, DANNY]);
    let load = load_fixture(&fixture);
    let store = InMemoryStore::new();
    store.reject_record(&load.records[1].record_id);

    let err = MigrationPipeline::new(&store, 10)
        .run(&load, &NoopObserver)
        .await
        .unwrap_err();

    match err {
        IngestError::WriteRejected { batch, failed, .. } => {
            assert_eq!(batch, 1);
            assert_eq!(failed, 1);
        },
        other => panic!("expected write rejection, got {other:?}"),
    }
    assert_eq!(store.len(), 2);
    assert!(store.document(&load.records[0].record_id).is_some());
    assert!(store.document(&load.records[2].record_id).is_some());
}

/// Cancels the run as soon as the first batch is applied
struct CancelAfterFirstBatch(CancellationToken);

impl MigrationObserver for CancelAfterFirstBatch {
    fn on_batch_applied(&self, _outcome: &BatchOutcome) {
        self.0.cancel();
    }
}

#[tokio::test]
async fn test_cancellation_stops_before_next_batch() {
    let fixture = patients(7);
    let load = load_fixture(&fixture);
    let store = InMemoryStore::new();
    let token = CancellationToken::new();

    let err = MigrationPipeline::new(&store, 3)
        .with_cancellation(token.clone())
        .run(&load, &CancelAfterFirstBatch(token))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Cancelled {
            completed: 1,
            total: 3
        }
    ));
    assert_eq!(store.bulk_write_calls(), 1);
    assert_eq!(store.len(), 3);
}
