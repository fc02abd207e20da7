//! Accumulating CSV table fed one page at a time.
//!
//! The header is fixed by the first non-empty page appended: the union of
//! that page's columns in first-appearance order. Later pages only add rows.
//! A record with a column outside the header is rejected; a record missing a
//! header column gets an empty cell.

use std::collections::HashSet;
use std::io::Write;

use serde_json::Value;
use tracing::debug;

use crate::error::PipelineError;
use crate::transform::Record;

/// Rows sharing one header, ready for CSV serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTable {
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
}

impl OutputTable {
    /// Creates an empty table with no header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Column names, once the first non-empty page has been appended.
    #[must_use]
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Rendered rows in append order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no rows have been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends one page of transformed records.
    ///
    /// The page is validated in full before any row is added, so a rejected
    /// page leaves the table unchanged. Returns the number of rows appended.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SchemaMismatch`] when a record has a column
    /// the header does not.
    pub fn append_page(&mut self, records: &[Record]) -> Result<usize, PipelineError> {
        if records.is_empty() {
            return Ok(0);
        }

        let header = match &self.header {
            Some(header) => header.clone(),
            None => header_for(records),
        };

        let known: HashSet<&str> = header.iter().map(String::as_str).collect();
        for (index, record) in records.iter().enumerate() {
            if let Some(column) = record.keys().find(|key| !known.contains(key.as_str())) {
                return Err(PipelineError::schema_mismatch(index, column.clone()));
            }
        }

        let rendered: Vec<Vec<String>> = records
            .iter()
            .map(|record| {
                header
                    .iter()
                    .map(|column| record.get(column).map(render_cell).unwrap_or_default())
                    .collect()
            })
            .collect();

        if self.header.is_none() {
            debug!(columns = header.len(), "table header established");
            self.header = Some(header);
        }
        let appended = rendered.len();
        self.rows.extend(rendered);
        Ok(appended)
    }

    /// Writes the header once followed by every row as CSV.
    ///
    /// A table without rows writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Csv`] or [`PipelineError::Io`] on write failure.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), PipelineError> {
        let Some(header) = &self.header else {
            return Ok(());
        };
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(header)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Serializes the table to a CSV string.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when serialization fails.
    pub fn to_csv_string(&self) -> Result<String, PipelineError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| PipelineError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

fn header_for(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut header = Vec::new();
    for key in records.iter().flat_map(|record| record.keys()) {
        if seen.insert(key.as_str()) {
            header.push(key.clone());
        }
    }
    header
}

/// Renders one JSON value as a CSV cell.
#[must_use]
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
