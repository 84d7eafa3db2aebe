//! Type normalization
//!
//! Turns raw CSV cells into typed [`AdmissionRecord`] values. A value that
//! cannot be parsed never aborts the run: it becomes absent and a
//! [`ParseWarning`] is returned alongside the record. Normalization is pure so
//! that identities derived from its output are reproducible.

use crate::record::AdmissionRecord;
use crate::schema::{ColumnIndex, Field};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::fmt;

/// Date-time layouts tried after RFC 3339
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Date-only layouts; the time is midnight
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Largest magnitude at which every integral `f64` is exact
const MAX_EXACT_FLOAT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A cell that could not be coerced to its field's type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line in the source file
    pub line: u64,
    pub field: Field,
    pub raw: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: '{}' is not a valid {} for column '{}'; stored as absent",
            self.line,
            self.raw,
            self.field.kind().as_str(),
            self.field.column()
        )
    }
}

/// Output of normalizing one row
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub record: AdmissionRecord,
    pub warnings: Vec<ParseWarning>,
}

/// Parse a date or date-time; `None` for empty or unrecognized input.
///
/// RFC 3339 values with an offset are converted to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Some(with_offset.naive_utc());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Parse an integer; integral float literals such as `42.0` are accepted
pub fn parse_integer(raw: &str) -> Option<i64> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    value.parse::<i64>().ok().or_else(|| {
        let float = value.parse::<f64>().ok()?;
        (float.is_finite() && float.fract() == 0.0 && float.abs() <= MAX_EXACT_FLOAT_INTEGER)
            .then_some(float as i64)
    })
}

/// Parse a finite float
pub fn parse_float(raw: &str) -> Option<f64> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|float| float.is_finite())
}

struct RowReader<'a> {
    line: u64,
    row: &'a StringRecord,
    columns: &'a ColumnIndex,
    warnings: Vec<ParseWarning>,
}

impl<'a> RowReader<'a> {
    fn raw(&self, field: Field) -> &'a str {
        self.columns.cell(self.row, field)
    }

    fn free_text(&self, field: Field) -> String {
        self.raw(field).trim().to_string()
    }

    fn categorical(&self, field: Field) -> String {
        self.raw(field).to_string()
    }

    fn typed<T>(&mut self, field: Field, parse: fn(&str) -> Option<T>) -> Option<T> {
        let raw = self.raw(field);
        let parsed = parse(raw);
        if parsed.is_none() && !raw.trim().is_empty() {
            self.warnings.push(ParseWarning {
                line: self.line,
                field,
                raw: raw.to_string(),
            });
        }
        parsed
    }
}

/// Normalize one data row located by `columns`.
///
/// `line` is only used to label warnings.
pub fn normalize_row(line: u64, row: &StringRecord, columns: &ColumnIndex) -> Normalized {
    let mut reader = RowReader {
        line,
        row,
        columns,
        warnings: Vec::new(),
    };

    let record = AdmissionRecord {
        name: reader.free_text(Field::Name),
        age: reader.typed(Field::Age, parse_integer),
        gender: reader.categorical(Field::Gender),
        blood_type: reader.categorical(Field::BloodType),
        medical_condition: reader.free_text(Field::MedicalCondition),
        date_of_admission: reader.typed(Field::DateOfAdmission, parse_timestamp),
        doctor: reader.free_text(Field::Doctor),
        hospital: reader.free_text(Field::Hospital),
        insurance_provider: reader.free_text(Field::InsuranceProvider),
        billing_amount: reader.typed(Field::BillingAmount, parse_float),
        room_number: reader.typed(Field::RoomNumber, parse_integer),
        admission_type: reader.categorical(Field::AdmissionType),
        discharge_date: reader.typed(Field::DischargeDate, parse_timestamp),
        medication: reader.free_text(Field::Medication),
        test_results: reader.categorical(Field::TestResults),
    };

    Normalized {
        record,
        warnings: reader.warnings,
    }
}
