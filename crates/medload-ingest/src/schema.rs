//! Admission dataset schema
//!
//! The dataset has one fixed layout. [`Field::ALL`] pins both the set of
//! required columns and the order used when deriving record identities, so it
//! must never be reordered.

use crate::error::{IngestError, Result};
use csv::StringRecord;
use std::fmt;

/// How a column is coerced during normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Trimmed string
    FreeText,
    /// String kept verbatim
    Categorical,
    /// `i64`, absent when unparsable
    Integer,
    /// `f64`, absent when unparsable
    Float,
    /// Date or date-time, absent when unparsable
    Timestamp,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::FreeText => "text",
            FieldKind::Categorical => "category",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Timestamp => "timestamp",
        }
    }
}

/// A canonical field of an admission record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Name,
    Age,
    Gender,
    BloodType,
    MedicalCondition,
    DateOfAdmission,
    Doctor,
    Hospital,
    InsuranceProvider,
    BillingAmount,
    RoomNumber,
    AdmissionType,
    DischargeDate,
    Medication,
    TestResults,
}

impl Field {
    pub const COUNT: usize = 15;

    /// Every field, in identity order
    pub const ALL: [Field; Field::COUNT] = [
        Field::Name,
        Field::Age,
        Field::Gender,
        Field::BloodType,
        Field::MedicalCondition,
        Field::DateOfAdmission,
        Field::Doctor,
        Field::Hospital,
        Field::InsuranceProvider,
        Field::BillingAmount,
        Field::RoomNumber,
        Field::AdmissionType,
        Field::DischargeDate,
        Field::Medication,
        Field::TestResults,
    ];

    /// Column name as it appears in the source header
    pub const fn column(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Age => "Age",
            Field::Gender => "Gender",
            Field::BloodType => "Blood Type",
            Field::MedicalCondition => "Medical Condition",
            Field::DateOfAdmission => "Date of Admission",
            Field::Doctor => "Doctor",
            Field::Hospital => "Hospital",
            Field::InsuranceProvider => "Insurance Provider",
            Field::BillingAmount => "Billing Amount",
            Field::RoomNumber => "Room Number",
            Field::AdmissionType => "Admission Type",
            Field::DischargeDate => "Discharge Date",
            Field::Medication => "Medication",
            Field::TestResults => "Test Results",
        }
    }

    /// Snake-cased key used in stored documents
    pub const fn key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Age => "age",
            Field::Gender => "gender",
            Field::BloodType => "blood_type",
            Field::MedicalCondition => "medical_condition",
            Field::DateOfAdmission => "date_of_admission",
            Field::Doctor => "doctor",
            Field::Hospital => "hospital",
            Field::InsuranceProvider => "insurance_provider",
            Field::BillingAmount => "billing_amount",
            Field::RoomNumber => "room_number",
            Field::AdmissionType => "admission_type",
            Field::DischargeDate => "discharge_date",
            Field::Medication => "medication",
            Field::TestResults => "test_results",
        }
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Field::Age | Field::RoomNumber => FieldKind::Integer,
            Field::BillingAmount => FieldKind::Float,
            Field::DateOfAdmission | Field::DischargeDate => FieldKind::Timestamp,
            Field::Name
            | Field::MedicalCondition
            | Field::Doctor
            | Field::Hospital
            | Field::InsuranceProvider
            | Field::Medication => FieldKind::FreeText,
            Field::Gender | Field::BloodType | Field::AdmissionType | Field::TestResults => {
                FieldKind::Categorical
            },
        }
    }

    const fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Header positions of every required column, produced by schema validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    positions: [usize; Field::COUNT],
}

impl ColumnIndex {
    /// Validate a header row and locate each required column.
    ///
    /// Extra columns are ignored. If a column name appears more than once the
    /// first occurrence wins. Fails with [`IngestError::Schema`] listing every
    /// missing column in canonical order.
    pub fn resolve(headers: &StringRecord) -> Result<Self> {
        let mut positions = [0usize; Field::COUNT];
        let mut missing = Vec::new();

        for field in Field::ALL {
            match headers.iter().position(|header| header == field.column()) {
                Some(position) => positions[field.position()] = position,
                None => missing.push(field.column().to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(IngestError::Schema { missing });
        }

        Ok(Self { positions })
    }

    /// Raw cell for `field`; short rows yield an empty string
    pub fn cell<'r>(&self, row: &'r StringRecord, field: Field) -> &'r str {
        row.get(self.positions[field.position()]).unwrap_or("")
    }
}
