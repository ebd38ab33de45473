//! Anomaly report and suggestion artifacts.
//!
//! The anomaly report has one row per anomaly with the columns
//! `record_id, field, current_value, issue_type, confidence_percentage`.
//! The suggestion artifact repeats those columns and adds `suggestions`.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CardcheckError, Result};
use crate::scan::AnomalyIndex;
use crate::validation::{Anomaly, IssueType};

/// One row of the anomaly report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub record_id: String,
    pub field: String,
    pub current_value: String,
    pub issue_type: IssueType,
    /// Confidence as a percentage with one decimal, e.g. `"90.0%"`.
    pub confidence_percentage: String,
}

impl ReportRow {
    pub fn from_anomaly(record_id: impl Into<String>, anomaly: &Anomaly) -> Self {
        Self {
            record_id: record_id.into(),
            field: anomaly.field.clone(),
            current_value: anomaly.value.clone(),
            issue_type: anomaly.issue_type,
            confidence_percentage: anomaly.confidence_percentage(),
        }
    }

    /// Recover the confidence in [0, 1] from the percentage string.
    pub fn confidence(&self) -> Option<f64> {
        self.confidence_percentage
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .ok()
            .map(|pct| pct / 100.0)
    }
}

/// One row of the suggestion artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRow {
    pub record_id: String,
    pub field: String,
    pub current_value: String,
    pub issue_type: IssueType,
    pub confidence_percentage: String,
    /// Advisory replacement for the record, if the oracle produced one.
    pub suggestions: Option<String>,
}

impl SuggestionRow {
    pub fn new(row: &ReportRow, suggestion: Option<String>) -> Self {
        Self {
            record_id: row.record_id.clone(),
            field: row.field.clone(),
            current_value: row.current_value.clone(),
            issue_type: row.issue_type,
            confidence_percentage: row.confidence_percentage.clone(),
            suggestions: suggestion,
        }
    }
}

impl AnomalyIndex {
    /// Flatten into report rows: index order, then validator order.
    pub fn to_report_rows(&self) -> Vec<ReportRow> {
        self.iter()
            .flat_map(|(id, anomalies)| {
                anomalies.iter().map(move |a| ReportRow::from_anomaly(id, a))
            })
            .collect()
    }

    /// Rebuild an index from report rows.
    pub fn from_report_rows(rows: &[ReportRow]) -> Result<Self> {
        let mut index = AnomalyIndex::new();
        for (row_idx, row) in rows.iter().enumerate() {
            let confidence = row.confidence().ok_or_else(|| CardcheckError::Report {
                row: row_idx,
                message: format!("invalid confidence '{}'", row.confidence_percentage),
            })?;
            let anomaly = Anomaly::new(&row.field, &row.current_value, row.issue_type)
                .with_confidence(confidence);
            index.push(row.record_id.clone(), anomaly);
        }
        Ok(index)
    }
}

/// Write report rows as CSV to any writer.
pub fn write_report_to<W: Write>(writer: W, rows: &[ReportRow]) -> Result<()> {
    write_rows(writer, rows, &REPORT_HEADERS)
}

/// Write the anomaly report to a CSV file.
pub fn write_report(path: impl AsRef<Path>, rows: &[ReportRow]) -> Result<()> {
    let path = path.as_ref();
    write_report_to(BufWriter::new(create(path)?), rows)
}

/// Read report rows from any CSV reader.
pub fn read_report_from<R: Read>(reader: R) -> Result<Vec<ReportRow>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut rows = Vec::new();
    for (row_idx, result) in reader.deserialize::<ReportRow>().enumerate() {
        let row = result.map_err(|e| CardcheckError::Report {
            row: row_idx,
            message: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Read an anomaly report CSV file.
pub fn read_report(path: impl AsRef<Path>) -> Result<Vec<ReportRow>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| CardcheckError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_report_from(file)
}

/// Write suggestion rows as CSV to any writer.
pub fn write_suggestions_to<W: Write>(writer: W, rows: &[SuggestionRow]) -> Result<()> {
    write_rows(writer, rows, &SUGGESTION_HEADERS)
}

/// Write the suggestion artifact to a CSV file.
pub fn write_suggestions(path: impl AsRef<Path>, rows: &[SuggestionRow]) -> Result<()> {
    let path = path.as_ref();
    write_suggestions_to(BufWriter::new(create(path)?), rows)
}

const REPORT_HEADERS: [&str; 5] = [
    "record_id",
    "field",
    "current_value",
    "issue_type",
    "confidence_percentage",
];

const SUGGESTION_HEADERS: [&str; 6] = [
    "record_id",
    "field",
    "current_value",
    "issue_type",
    "confidence_percentage",
    "suggestions",
];

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| CardcheckError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Serialize rows, writing the header explicitly so an empty report still
/// carries its columns.
fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T], headers: &[&str]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| CardcheckError::Csv(e.into()))?;
    Ok(())
}
