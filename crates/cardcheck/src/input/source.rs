//! Record store abstraction and source metadata.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CardcheckError, Result};

/// Metadata about the source record file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without path.
    pub file: String,
    /// Full path to the file.
    pub path: PathBuf,
    /// SHA-256 hash of the file contents.
    pub hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Detected format (csv, tsv, etc.).
    pub format: String,
    /// Number of records (excluding header).
    pub row_count: usize,
    /// Number of columns.
    pub column_count: usize,
    /// When the file was read.
    pub read_at: DateTime<Utc>,
}

impl SourceMetadata {
    /// Create metadata for a file that has been read.
    pub fn new(
        path: PathBuf,
        hash: String,
        size_bytes: u64,
        format: String,
        row_count: usize,
        column_count: usize,
    ) -> Self {
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file,
            path,
            hash,
            size_bytes,
            format,
            row_count,
            column_count,
            read_at: Utc::now(),
        }
    }
}

/// One extracted record card: field name to value, `None` for a null cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: IndexMap<String, Option<String>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(column.into(), Some(value.into()));
        self
    }

    /// Builder-style null field.
    pub fn with_null(mut self, column: impl Into<String>) -> Self {
        self.fields.insert(column.into(), None);
        self
    }

    /// Get a non-null value. Absent columns and null cells both yield `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(|v| v.as_deref())
    }

    /// Whether the column exists on this record at all.
    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Set (or clear) a field value, keeping column order.
    pub fn set(&mut self, column: impl Into<String>, value: Option<String>) {
        self.fields.insert(column.into(), value);
    }

    /// Iterate over fields in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

/// All records read from one store, in source order.
#[derive(Debug, Clone)]
pub struct RecordSet {
    id_column: String,
    headers: Vec<String>,
    records: Vec<Record>,
    positions: HashMap<String, usize>,
}

impl RecordSet {
    /// Build a record set, indexing records by their identifier.
    ///
    /// Records without an identifier are kept (the scanner reports them) but
    /// cannot be looked up. A repeated identifier points at its last record.
    pub fn new(id_column: impl Into<String>, headers: Vec<String>, records: Vec<Record>) -> Self {
        let id_column = id_column.into();
        let mut positions = HashMap::with_capacity(records.len());

        for (idx, record) in records.iter().enumerate() {
            if let Some(id) = record.get(&id_column).map(str::trim).filter(|s| !s.is_empty()) {
                if positions.insert(id.to_string(), idx).is_some() {
                    warn!(record_id = id, row = idx, "duplicate record identifier");
                }
            }
        }

        Self {
            id_column,
            headers,
            records,
            positions,
        }
    }

    /// Build from raw rows, failing fast if the identifier column is absent.
    ///
    /// Empty cells become nulls.
    pub fn from_rows(
        id_column: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<Self> {
        let id_column = id_column.into();
        if !headers.iter().any(|h| h == &id_column) {
            return Err(CardcheckError::MissingColumn { column: id_column });
        }

        let records = rows
            .into_iter()
            .map(|row| {
                let mut record = Record::new();
                for (header, value) in headers.iter().zip(row) {
                    let value = if value.is_empty() { None } else { Some(value) };
                    record.set(header.clone(), value);
                }
                record
            })
            .collect();

        Ok(Self::new(id_column, headers, records))
    }

    /// Name of the identifier column.
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Column headers in source order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in source order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Look up a record by identifier.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.positions.get(id).map(|&idx| &self.records[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Identifier of a record, trimmed; `None` when missing or blank.
    pub fn id_of<'a>(&self, record: &'a Record) -> Option<&'a str> {
        record
            .get(&self.id_column)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
