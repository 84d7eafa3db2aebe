//! Destination store abstraction
//!
//! The load pipeline only talks to an [`AdmissionStore`]. [`MongoStore`] is
//! the production implementation; [`InMemoryStore`] backs tests.

mod memory;
mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

use crate::error::Result;
use crate::indexes::IndexSpec;
use crate::record::IdentifiedRecord;
use async_trait::async_trait;

/// Server error code for a unique index violation
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// One rejected operation inside a bulk write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// Position of the operation within its batch
    pub index: usize,
    pub code: i32,
    pub message: String,
}

impl WriteFailure {
    pub fn is_duplicate_key(&self) -> bool {
        self.code == DUPLICATE_KEY_CODE
    }
}

/// Result of one unordered bulk upsert
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteSummary {
    /// Documents inserted because no identity matched
    pub upserted: u64,
    /// Operations whose identity matched an existing document
    pub matched: u64,
    /// Matched documents whose content actually changed
    pub modified: u64,
    /// Operations the destination rejected; all others were applied
    pub failures: Vec<WriteFailure>,
}

impl BulkWriteSummary {
    /// Add the counts and failures of a write covering a later part of the same batch
    pub fn absorb(&mut self, other: BulkWriteSummary) {
        self.upserted += other.upserted;
        self.matched += other.matched;
        self.modified += other.modified;
        self.failures.extend(other.failures);
    }
}

/// Destination for admission documents
#[async_trait]
pub trait AdmissionStore: Send + Sync {
    /// Create the given indexes; existing identical indexes are left as-is
    async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> Result<()>;

    /// Number of documents currently stored
    async fn count_documents(&self) -> Result<u64>;

    /// Apply one upsert per record, matched on `record_id`, without ordering.
    ///
    /// A rejected operation must not prevent the others from being applied;
    /// rejections are returned in [`BulkWriteSummary::failures`]. An `Err` means
    /// the batch as a whole could not be submitted.
    async fn bulk_upsert(&self, batch: &[IdentifiedRecord]) -> Result<BulkWriteSummary>;
}
