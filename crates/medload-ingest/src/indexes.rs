//! Destination index provisioning
//!
//! Index creation is idempotent, so provisioning runs on every load before
//! the first upsert.

use crate::error::Result;
use crate::observer::MigrationObserver;
use crate::record::RECORD_ID_FIELD;
use crate::store::AdmissionStore;

/// Key direction within an index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_i32(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// Declarative description of one index on the admissions collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub keys: &'static [(&'static str, SortOrder)],
    pub unique: bool,
}

/// Indexes every load ensures exist
pub const ADMISSION_INDEXES: [IndexSpec; 6] = [
    IndexSpec {
        name: "uniq_record_id",
        keys: &[(RECORD_ID_FIELD, SortOrder::Ascending)],
        unique: true,
    },
    IndexSpec {
        name: "idx_medical_condition",
        keys: &[("medical_condition", SortOrder::Ascending)],
        unique: false,
    },
    IndexSpec {
        name: "idx_hospital",
        keys: &[("hospital", SortOrder::Ascending)],
        unique: false,
    },
    IndexSpec {
        name: "idx_doctor",
        keys: &[("doctor", SortOrder::Ascending)],
        unique: false,
    },
    IndexSpec {
        name: "idx_date_of_admission_desc",
        keys: &[("date_of_admission", SortOrder::Descending)],
        unique: false,
    },
    IndexSpec {
        name: "idx_hospital_date",
        keys: &[
            ("hospital", SortOrder::Ascending),
            ("date_of_admission", SortOrder::Descending),
        ],
        unique: false,
    },
];

/// Ensure [`ADMISSION_INDEXES`] exist on the destination
pub async fn provision_indexes<S>(store: &S, observer: &dyn MigrationObserver) -> Result<()>
where
    S: AdmissionStore + ?Sized,
{
    store.ensure_indexes(&ADMISSION_INDEXES).await?;
    observer.on_indexes_ready(ADMISSION_INDEXES.len());
    Ok(())
}
