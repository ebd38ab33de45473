//! Suggestion merger: attaches advisory values next to the original data.

use tracing::{info, warn};

use crate::input::RecordSet;
use crate::oracle::SuggestionMap;
use crate::report::{ReportRow, SuggestionRow};

/// Default name of the advisory column.
pub const DEFAULT_SUGGESTION_COLUMN: &str = "Suggestions";

/// Folds a suggestion map onto records without touching the original fields.
#[derive(Debug, Clone)]
pub struct SuggestionMerger {
    column: String,
}

impl SuggestionMerger {
    pub fn new() -> Self {
        Self::with_column(DEFAULT_SUGGESTION_COLUMN)
    }

    /// Use a custom advisory column name.
    pub fn with_column(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Return a copy of the records with the advisory column set on each.
    ///
    /// Records without a suggestion get a null value. The column is replaced
    /// on every merge, so merging the same map twice equals merging once.
    pub fn merge_records(&self, records: &RecordSet, suggestions: &SuggestionMap) -> RecordSet {
        self.warn_orphans(suggestions, |id| records.contains(id));
        if self.overwrites_source_column(records) {
            warn!(
                column = %self.column,
                "source data already has a column with the advisory name; its values are replaced"
            );
        }

        let mut merged = Vec::with_capacity(records.len());
        let mut attached = 0usize;
        for record in records.iter() {
            let suggestion = records
                .id_of(record)
                .and_then(|id| suggestions.get(id))
                .cloned();
            attached += usize::from(suggestion.is_some());

            let mut record = record.clone();
            record.set(self.column.clone(), suggestion);
            merged.push(record);
        }

        let mut headers = records.headers().to_vec();
        if !headers.iter().any(|h| h == &self.column) {
            headers.push(self.column.clone());
        }

        info!(records = records.len(), attached, column = %self.column, "merged suggestions");
        RecordSet::new(records.id_column(), headers, merged)
    }

    /// True when the advisory column exists in `records` but was not appended
    /// by an earlier merge. Merges always append it as the last header.
    pub fn overwrites_source_column(&self, records: &RecordSet) -> bool {
        let headers = records.headers();
        headers.iter().any(|h| h == &self.column)
            && headers.last().is_some_and(|h| h != &self.column)
    }

    /// Build the suggestion artifact: each report row plus its record's suggestion.
    pub fn merge_rows(
        &self,
        rows: &[ReportRow],
        suggestions: &SuggestionMap,
    ) -> Vec<SuggestionRow> {
        self.warn_orphans(suggestions, |id| rows.iter().any(|r| r.record_id == id));

        rows.iter()
            .map(|row| SuggestionRow::new(row, suggestions.get(&row.record_id).cloned()))
            .collect()
    }

    fn warn_orphans(&self, suggestions: &SuggestionMap, known: impl Fn(&str) -> bool) {
        for id in suggestions.keys().filter(|id| !known(id.as_str())) {
            warn!(record_id = %id, "suggestion has no matching record; skipping");
        }
    }
}

impl Default for SuggestionMerger {
    fn default() -> Self {
        Self::new()
    }
}
