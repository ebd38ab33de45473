//! Dataset scanner: validates every record and indexes the findings.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ValidatorConfig;
use crate::error::CardcheckError;
use crate::input::RecordSet;
use crate::validation::{Anomaly, IssueType, RecordValidator};

/// Record identifier to its anomalies, in validator order.
///
/// Only records with at least one anomaly are present. The index is a
/// snapshot: scanning again produces a new index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyIndex {
    entries: IndexMap<String, Vec<Anomaly>>,
}

impl AnomalyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the anomalies for one record. Empty lists are not stored, and
    /// a repeated identifier replaces its previous entry.
    pub(crate) fn insert(&mut self, id: impl Into<String>, anomalies: Vec<Anomaly>) {
        let id = id.into();
        self.entries.shift_remove(&id);
        if !anomalies.is_empty() {
            self.entries.insert(id, anomalies);
        }
    }

    /// Append one anomaly to a record's list, creating it if needed.
    pub(crate) fn push(&mut self, id: impl Into<String>, anomaly: Anomaly) {
        self.entries.entry(id.into()).or_default().push(anomaly);
    }

    /// Number of flagged records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&[Anomaly]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Iterate over flagged records in scan order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Anomaly])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Identifiers of flagged records in scan order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Total anomalies across all records.
    pub fn total_anomalies(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Drop identifiers that do not exist in the record set.
    ///
    /// Returns the orphaned identifiers.
    pub fn reconcile(&mut self, records: &RecordSet) -> Vec<String> {
        let orphans: Vec<String> = self
            .entries
            .keys()
            .filter(|id| !records.contains(id))
            .cloned()
            .collect();

        for id in &orphans {
            warn!(record_id = %id, "anomaly entry has no matching record; skipping");
            self.entries.shift_remove(id);
        }

        orphans
    }

    /// Compute summary statistics for reporting.
    pub fn summary(&self) -> ScanSummary {
        let mut by_field: HashMap<&str, usize> = HashMap::new();
        let mut by_issue: HashMap<IssueType, usize> = HashMap::new();

        for anomaly in self.entries.values().flatten() {
            *by_field.entry(anomaly.field.as_str()).or_default() += 1;
            *by_issue.entry(anomaly.issue_type).or_default() += 1;
        }

        let flagged_records = self.len();
        let total_anomalies = self.total_anomalies();
        let average_per_flagged = if flagged_records == 0 {
            0.0
        } else {
            total_anomalies as f64 / flagged_records as f64
        };

        let mut by_field: Vec<(String, usize)> = by_field
            .into_iter()
            .map(|(field, count)| (field.to_string(), count))
            .collect();
        by_field.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut by_issue_type: Vec<(IssueType, usize)> = by_issue.into_iter().collect();
        by_issue_type.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));

        ScanSummary {
            flagged_records,
            total_anomalies,
            average_per_flagged,
            by_field,
            by_issue_type,
        }
    }
}

/// Summary statistics over an anomaly index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Records with at least one anomaly.
    pub flagged_records: usize,
    /// Anomalies across all flagged records.
    pub total_anomalies: usize,
    /// Mean anomalies per flagged record (0.0 when none are flagged).
    pub average_per_flagged: f64,
    /// Anomaly counts per field, most frequent first.
    pub by_field: Vec<(String, usize)>,
    /// Anomaly counts per issue type, most frequent first.
    pub by_issue_type: Vec<(IssueType, usize)>,
}

/// Result of scanning one record set.
#[derive(Debug, Clone)]
pub struct Scan {
    /// The sparse anomaly index.
    pub index: AnomalyIndex,
    /// Number of records inspected.
    pub records_scanned: usize,
    /// Source rows skipped because they have no identifier.
    pub skipped_rows: Vec<usize>,
}

/// Runs the record validator over a whole record set.
pub struct DatasetScanner {
    validator: RecordValidator,
}

impl DatasetScanner {
    /// Create a scanner with the default rules.
    pub fn new() -> Self {
        Self {
            validator: RecordValidator::new(),
        }
    }

    /// Create a scanner with custom rules.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self {
            validator: RecordValidator::with_config(config),
        }
    }

    /// Create a scanner around an existing validator.
    pub fn with_validator(validator: RecordValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &RecordValidator {
        &self.validator
    }

    /// Scan every record and return the sparse anomaly index.
    pub fn scan(&self, records: &RecordSet) -> AnomalyIndex {
        self.scan_detailed(records).index
    }

    /// Scan every record, also reporting what was skipped.
    ///
    /// A record without an identifier is skipped rather than aborting the
    /// scan; it cannot be referenced by the index.
    pub fn scan_detailed(&self, records: &RecordSet) -> Scan {
        let mut index = AnomalyIndex::new();
        let mut skipped_rows = Vec::new();

        for (row, record) in records.iter().enumerate() {
            match self.validator.validate_record(record, row) {
                Ok(anomalies) => {
                    if let Some(id) = records.id_of(record) {
                        index.insert(id, anomalies);
                    }
                }
                Err(CardcheckError::MissingIdentifier { row, column }) => {
                    warn!(row, column = %column, "record has no identifier; skipping");
                    skipped_rows.push(row);
                }
                Err(e) => {
                    warn!(row, error = %e, "record could not be validated; skipping");
                    skipped_rows.push(row);
                }
            }
        }

        info!(
            records = records.len(),
            flagged = index.len(),
            anomalies = index.total_anomalies(),
            skipped = skipped_rows.len(),
            "dataset scan complete"
        );

        Scan {
            index,
            records_scanned: records.len(),
            skipped_rows,
        }
    }
}

impl Default for DatasetScanner {
    fn default() -> Self {
        Self::new()
    }
}
