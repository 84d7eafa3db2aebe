//! CSV source reading

use crate::error::{IngestError, Result};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// One data row with its 1-based line number in the source file
#[derive(Debug, Clone)]
pub struct SourceRow {
    pub line: u64,
    pub cells: StringRecord,
}

/// Header and rows of a comma-separated source file
#[derive(Debug, Clone)]
pub struct SourceTable {
    headers: StringRecord,
    rows: Vec<SourceRow>,
}

impl SourceTable {
    /// Read a CSV file from disk.
    ///
    /// Rows may be shorter or longer than the header; missing cells read as
    /// empty strings.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(IngestError::InputNotFound(path.to_path_buf()));
        }

        debug!(path = %path.display(), "Reading CSV source");
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Read CSV data from any reader; the first record is the header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let mut rows = Vec::new();
        for result in reader.records() {
            let cells = result?;
            let line = cells.position().map(|p| p.line()).unwrap_or_default();
            rows.push(SourceRow { line, cells });
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn rows(&self) -> &[SourceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows identical, across every column, to an earlier row
    pub fn duplicate_rows(&self) -> usize {
        let mut seen: HashSet<Vec<&str>> = HashSet::with_capacity(self.rows.len());
        self.rows
            .iter()
            .filter(|row| !seen.insert(row.cells.iter().collect()))
            .count()
    }
}
