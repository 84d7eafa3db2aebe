//! Normalized admission records and their stored document shape

use crate::schema::Field;
use chrono::NaiveDateTime;
use mongodb::bson::{self, Bson, Document};
use std::borrow::Cow;
use std::fmt;

/// Document key holding the record identity
pub const RECORD_ID_FIELD: &str = "record_id";

/// Rendering of timestamps inside record identities
const IDENTITY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One admission row after type normalization.
///
/// Absent values are `None`; text fields are never absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdmissionRecord {
    pub name: String,
    pub age: Option<i64>,
    pub gender: String,
    pub blood_type: String,
    pub medical_condition: String,
    pub date_of_admission: Option<NaiveDateTime>,
    pub doctor: String,
    pub hospital: String,
    pub insurance_provider: String,
    pub billing_amount: Option<f64>,
    pub room_number: Option<i64>,
    pub admission_type: String,
    pub discharge_date: Option<NaiveDateTime>,
    pub medication: String,
    pub test_results: String,
}

/// Borrowed, typed view of one field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Integer(Option<i64>),
    Float(Option<f64>),
    Timestamp(Option<NaiveDateTime>),
}

impl<'a> FieldValue<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            FieldValue::Integer(None) | FieldValue::Float(None) | FieldValue::Timestamp(None)
        )
    }

    /// Trimmed string form used for identity derivation; absent renders as ""
    pub fn render(&self) -> Cow<'a, str> {
        match *self {
            FieldValue::Text(text) => Cow::Borrowed(text.trim()),
            FieldValue::Integer(Some(value)) => Cow::Owned(value.to_string()),
            FieldValue::Float(Some(value)) => Cow::Owned(value.to_string()),
            FieldValue::Timestamp(Some(value)) => {
                Cow::Owned(value.format(IDENTITY_TIMESTAMP_FORMAT).to_string())
            },
            FieldValue::Integer(None) | FieldValue::Float(None) | FieldValue::Timestamp(None) => {
                Cow::Borrowed("")
            },
        }
    }

    /// Stored form: BSON dates for timestamps, null for absent values
    pub fn to_bson(&self) -> Bson {
        match *self {
            FieldValue::Text(text) => Bson::String(text.to_string()),
            FieldValue::Integer(Some(value)) => Bson::Int64(value),
            FieldValue::Float(Some(value)) => Bson::Double(value),
            FieldValue::Timestamp(Some(value)) => {
                Bson::DateTime(bson::DateTime::from_millis(value.and_utc().timestamp_millis()))
            },
            FieldValue::Integer(None) | FieldValue::Float(None) | FieldValue::Timestamp(None) => {
                Bson::Null
            },
        }
    }
}

impl AdmissionRecord {
    pub fn value(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::Name => FieldValue::Text(&self.name),
            Field::Age => FieldValue::Integer(self.age),
            Field::Gender => FieldValue::Text(&self.gender),
            Field::BloodType => FieldValue::Text(&self.blood_type),
            Field::MedicalCondition => FieldValue::Text(&self.medical_condition),
            Field::DateOfAdmission => FieldValue::Timestamp(self.date_of_admission),
            Field::Doctor => FieldValue::Text(&self.doctor),
            Field::Hospital => FieldValue::Text(&self.hospital),
            Field::InsuranceProvider => FieldValue::Text(&self.insurance_provider),
            Field::BillingAmount => FieldValue::Float(self.billing_amount),
            Field::RoomNumber => FieldValue::Integer(self.room_number),
            Field::AdmissionType => FieldValue::Text(&self.admission_type),
            Field::DischargeDate => FieldValue::Timestamp(self.discharge_date),
            Field::Medication => FieldValue::Text(&self.medication),
            Field::TestResults => FieldValue::Text(&self.test_results),
        }
    }

    /// All canonical fields keyed by their snake-cased names
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        for field in Field::ALL {
            document.insert(field.key(), self.value(field).to_bson());
        }
        document
    }
}

/// Content-derived identity of a record (lowercase hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub(crate) fn new(digest: String) -> Self {
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A normalized record carrying its identity, ready to upsert
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifiedRecord {
    pub record_id: RecordId,
    pub record: AdmissionRecord,
}

impl IdentifiedRecord {
    /// Stored document: every canonical field plus `record_id`
    pub fn to_document(&self) -> Document {
        let mut document = self.record.to_document();
        document.insert(RECORD_ID_FIELD, self.record_id.as_str());
        document
    }
}
