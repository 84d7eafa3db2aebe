//! Batch upsert engine
//!
//! Records are split into consecutive batches and each batch is applied as one
//! unordered bulk upsert keyed on `record_id`. Batches run strictly in
//! sequence; a batch that has been submitted stays committed whatever happens
//! to later ones, so a failed run can simply be repeated.

use crate::error::{IngestError, Result};
use crate::observer::MigrationObserver;
use crate::record::IdentifiedRecord;
use crate::store::AdmissionStore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Split `records` into consecutive slices of at most `batch_size`
pub fn partition<T>(records: &[T], batch_size: usize) -> std::slice::Chunks<'_, T> {
    records.chunks(batch_size.max(1))
}

/// Number of batches [`partition`] yields
pub fn batch_count(records: usize, batch_size: usize) -> usize {
    records.div_ceil(batch_size.max(1))
}

/// Counts reported for one applied batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// 1-based batch number
    pub number: usize,
    pub size: usize,
    pub upserted: u64,
    pub matched: u64,
    pub modified: u64,
    /// Operations refused as duplicate keys on `record_id`
    pub conflicts: u64,
}

/// Totals over every applied batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub batches: usize,
    pub records: usize,
    pub upserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub conflicts: u64,
}

impl UpsertSummary {
    fn add(&mut self, outcome: &BatchOutcome) {
        self.batches += 1;
        self.records += outcome.size;
        self.upserted += outcome.upserted;
        self.matched += outcome.matched;
        self.modified += outcome.modified;
        self.conflicts += outcome.conflicts;
    }
}

/// Applies identified records to a store in fixed-size batches
pub struct BatchUpsertEngine<'a, S: ?Sized> {
    store: &'a S,
    batch_size: usize,
    cancel: Option<CancellationToken>,
}

impl<'a, S> BatchUpsertEngine<'a, S>
where
    S: AdmissionStore + ?Sized,
{
    pub fn new(store: &'a S, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(IngestError::config("batch size must be at least 1"));
        }
        Ok(Self {
            store,
            batch_size,
            cancel: None,
        })
    }

    /// Stop before the next unstarted batch once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Upsert every record.
    ///
    /// Connectivity failures are returned immediately. Rejected operations
    /// other than duplicate keys end the run with
    /// [`IngestError::WriteRejected`] once the rest of their batch is applied.
    pub async fn run(
        &self,
        records: &[IdentifiedRecord],
        observer: &dyn MigrationObserver,
    ) -> Result<UpsertSummary> {
        if records.is_empty() {
            observer.on_empty_input();
            return Ok(UpsertSummary::default());
        }

        let total = batch_count(records.len(), self.batch_size);
        observer.on_upsert_started(records.len(), total);

        let mut summary = UpsertSummary::default();
        match self.apply_batches(records, total, &mut summary, observer).await {
            Ok(()) => {
                observer.on_upsert_finished(&summary);
                Ok(summary)
            },
            Err(err) => {
                observer.on_upsert_aborted(&summary, &err);
                Err(err)
            },
        }
    }

    async fn apply_batches(
        &self,
        records: &[IdentifiedRecord],
        total: usize,
        summary: &mut UpsertSummary,
        observer: &dyn MigrationObserver,
    ) -> Result<()> {
        for (index, batch) in partition(records, self.batch_size).enumerate() {
            if self.is_cancelled() {
                return Err(IngestError::Cancelled {
                    completed: index,
                    total,
                });
            }

            let number = index + 1;
            debug!(batch = number, size = batch.len(), "Submitting batch");
            let written = self.store.bulk_upsert(batch).await?;

            let (conflicts, rejected): (Vec<_>, Vec<_>) = written
                .failures
                .into_iter()
                .partition(|failure| failure.is_duplicate_key());

            let outcome = BatchOutcome {
                number,
                size: batch.len(),
                upserted: written.upserted,
                matched: written.matched,
                modified: written.modified,
                conflicts: conflicts.len() as u64,
            };
            summary.add(&outcome);
            observer.on_batch_applied(&outcome);

            if let Some(first) = rejected.first() {
                return Err(IngestError::WriteRejected {
                    batch: number,
                    failed: rejected.len(),
                    message: first.message.clone(),
                });
            }
        }
        Ok(())
    }
}
