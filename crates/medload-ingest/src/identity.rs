//! Record identity derivation
//!
//! The identity is the idempotency key of the load: re-running the same input
//! resolves every row to the document it produced the first time.

use crate::record::{AdmissionRecord, IdentifiedRecord, RecordId};
use crate::schema::Field;
use medload_common::fingerprint;

/// Identity of `record` over an explicit field order.
///
/// Each value is rendered with [`FieldValue::render`](crate::record::FieldValue::render)
/// (absent values as the empty string) before fingerprinting.
pub fn record_id_for_fields(record: &AdmissionRecord, fields: &[Field]) -> RecordId {
    RecordId::new(fingerprint(
        fields.iter().map(|field| record.value(*field).render()),
    ))
}

/// Identity of `record` over the canonical field order [`Field::ALL`]
pub fn derive_record_id(record: &AdmissionRecord) -> RecordId {
    record_id_for_fields(record, &Field::ALL)
}

/// Attach the canonical identity to a record
pub fn identify(record: AdmissionRecord) -> IdentifiedRecord {
    IdentifiedRecord {
        record_id: derive_record_id(&record),
        record,
    }
}
