//! End-to-end load: validate, normalize, identify, then upsert
//!
//! Preparation is pure and runs before any connection to the destination, so a
//! schema mismatch never touches the store.

use crate::error::Result;
use crate::identity::identify;
use crate::indexes::provision_indexes;
use crate::normalize::normalize_row;
use crate::observer::{CountPhase, MigrationObserver};
use crate::record::IdentifiedRecord;
use crate::schema::ColumnIndex;
use crate::source::SourceTable;
use crate::store::AdmissionStore;
use crate::upsert::{BatchUpsertEngine, UpsertSummary};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Statistics gathered while preparing a source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareStats {
    pub rows_read: usize,
    /// Rows identical in every column to an earlier row
    pub duplicate_rows: usize,
    pub parse_warnings: usize,
    pub distinct_identities: usize,
}

/// Identified records ready to load
#[derive(Debug, Clone)]
pub struct PreparedLoad {
    pub records: Vec<IdentifiedRecord>,
    pub stats: PrepareStats,
}

/// Validate the header, then normalize and identify every row.
///
/// Fails with [`IngestError::Schema`](crate::IngestError::Schema) before any
/// row is looked at when required columns are missing.
pub fn prepare(table: &SourceTable, observer: &dyn MigrationObserver) -> Result<PreparedLoad> {
    let columns = ColumnIndex::resolve(table.headers())?;

    let mut parse_warnings = 0;
    let records: Vec<IdentifiedRecord> = table
        .rows()
        .iter()
        .map(|row| {
            let normalized = normalize_row(row.line, &row.cells, &columns);
            parse_warnings += normalized.warnings.len();
            for warning in &normalized.warnings {
                observer.on_parse_warning(warning);
            }
            identify(normalized.record)
        })
        .collect();

    let distinct_identities = records
        .iter()
        .map(|record| record.record_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    let stats = PrepareStats {
        rows_read: table.len(),
        duplicate_rows: table.duplicate_rows(),
        parse_warnings,
        distinct_identities,
    };
    observer.on_source_loaded(&stats);

    Ok(PreparedLoad { records, stats })
}

/// Outcome of a completed load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub stats: PrepareStats,
    pub documents_before: u64,
    pub documents_after: u64,
    pub summary: UpsertSummary,
}

/// Loads prepared records into a store
pub struct MigrationPipeline<'a, S: ?Sized> {
    store: &'a S,
    batch_size: usize,
    cancel: Option<CancellationToken>,
}

impl<'a, S> MigrationPipeline<'a, S>
where
    S: AdmissionStore + ?Sized,
{
    pub fn new(store: &'a S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Ensure indexes, then upsert every record, counting documents around the load
    pub async fn run(
        &self,
        load: &PreparedLoad,
        observer: &dyn MigrationObserver,
    ) -> Result<MigrationReport> {
        let mut engine = BatchUpsertEngine::new(self.store, self.batch_size)?;
        if let Some(token) = &self.cancel {
            engine = engine.with_cancellation(token.clone());
        }

        provision_indexes(self.store, observer).await?;

        let documents_before = self.store.count_documents().await?;
        observer.on_document_count(CountPhase::BeforeLoad, documents_before);

        let summary = engine.run(&load.records, observer).await?;

        let documents_after = self.store.count_documents().await?;
        observer.on_document_count(CountPhase::AfterLoad, documents_after);

        Ok(MigrationReport {
            stats: load.stats.clone(),
            documents_before,
            documents_after,
            summary,
        })
    }
}
