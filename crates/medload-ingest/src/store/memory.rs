//! In-process store with MongoDB upsert semantics

use super::{AdmissionStore, BulkWriteSummary, WriteFailure};
use crate::error::{IngestError, Result};
use crate::indexes::IndexSpec;
use crate::record::{IdentifiedRecord, RecordId};
use async_trait::async_trait;
use mongodb::bson::Document;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Server error code used for injected rejections (document validation failure)
const REJECTED_CODE: i32 = 121;

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<String, Document>,
    indexes: BTreeSet<String>,
    bulk_calls: usize,
    fail_on_call: Option<usize>,
    rejected: HashSet<String>,
}

/// Store keeping documents in memory, keyed by `record_id`.
///
/// Clones share the same state. Failures can be injected to exercise the
/// loader's error paths.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the `call`-th bulk write (1-based) fail as if the server were unreachable
    pub fn fail_on_bulk_write(&self, call: usize) {
        self.state().fail_on_call = Some(call);
    }

    /// Reject every upsert for `record_id`
    pub fn reject_record(&self, record_id: &RecordId) {
        self.state().rejected.insert(record_id.as_str().to_string());
    }

    /// Insert a document directly, bypassing upsert accounting
    pub fn seed(&self, record: &IdentifiedRecord) {
        self.state()
            .documents
            .insert(record.record_id.as_str().to_string(), record.to_document());
    }

    pub fn document(&self, record_id: &RecordId) -> Option<Document> {
        self.state().documents.get(record_id.as_str()).cloned()
    }

    pub fn record_ids(&self) -> Vec<String> {
        self.state().documents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().documents.is_empty()
    }

    pub fn index_names(&self) -> Vec<String> {
        self.state().indexes.iter().cloned().collect()
    }

    /// Number of bulk writes attempted, including failed ones
    pub fn bulk_write_calls(&self) -> usize {
        self.state().bulk_calls
    }
}

#[async_trait]
impl AdmissionStore for InMemoryStore {
    async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> Result<()> {
        let mut state = self.state();
        state
            .indexes
            .extend(indexes.iter().map(|spec| spec.name.to_string()));
        Ok(())
    }

    async fn count_documents(&self) -> Result<u64> {
        Ok(self.state().documents.len() as u64)
    }

    async fn bulk_upsert(&self, batch: &[IdentifiedRecord]) -> Result<BulkWriteSummary> {
        let mut state = self.state();
        state.bulk_calls += 1;
        if state.fail_on_call == Some(state.bulk_calls) {
            return Err(IngestError::connectivity(format!(
                "simulated connection failure on bulk write {}",
                state.bulk_calls
            )));
        }

        let mut summary = BulkWriteSummary::default();
        for (index, record) in batch.iter().enumerate() {
            let key = record.record_id.as_str();
            if state.rejected.contains(key) {
                summary.failures.push(WriteFailure {
                    index,
                    code: REJECTED_CODE,
                    message: format!("Document failed validation: {}", key),
                });
                continue;
            }

            let incoming = record.to_document();
            match state.documents.get_mut(key) {
                Some(existing) => {
                    summary.matched += 1;
                    let changed = incoming
                        .iter()
                        .any(|(field, value)| existing.get(field) != Some(value));
                    if changed {
                        // $set semantics: listed fields overwrite, others survive
                        existing.extend(incoming);
                        summary.modified += 1;
                    }
                },
                None => {
                    state.documents.insert(key.to_string(), incoming);
                    summary.upserted += 1;
                },
            }
        }

        Ok(summary)
    }
}
