//! Anomaly extractor: collects the current values flagged with one issue type.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::report::ReportRow;
use crate::scan::AnomalyIndex;
use crate::validation::IssueType;

/// Correction candidates for one issue type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Record identifier to its flagged value, in first-seen order.
    pub values: IndexMap<String, String>,
    /// Identifiers that appeared more than once; only the last value was kept.
    pub collisions: Vec<String>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Collect `record_id -> current_value` for every row with `issue_type`.
///
/// A record with several anomalies of the same issue type (possible when two
/// fields share a rule) keeps only the last value; such identifiers are
/// listed in [`Extraction::collisions`].
pub fn extract(rows: &[ReportRow], issue_type: IssueType) -> Extraction {
    collect(
        rows.iter()
            .map(|r| (r.record_id.as_str(), r.issue_type, r.current_value.as_str())),
        issue_type,
    )
}

/// Same as [`extract`], reading directly from an index.
pub fn extract_from_index(index: &AnomalyIndex, issue_type: IssueType) -> Extraction {
    collect(
        index.iter().flat_map(|(id, anomalies)| {
            anomalies
                .iter()
                .map(move |a| (id, a.issue_type, a.value.as_str()))
        }),
        issue_type,
    )
}

fn collect<'a>(
    items: impl Iterator<Item = (&'a str, IssueType, &'a str)>,
    issue_type: IssueType,
) -> Extraction {
    let mut extraction = Extraction::default();

    for (id, issue, value) in items {
        if issue != issue_type {
            continue;
        }
        if let Some(previous) = extraction.values.insert(id.to_string(), value.to_string()) {
            warn!(
                record_id = id,
                issue_type = %issue_type,
                overwritten = %previous,
                "duplicate identifier during extraction; keeping last value"
            );
            extraction.collisions.push(id.to_string());
        }
    }

    debug!(
        issue_type = %issue_type,
        candidates = extraction.len(),
        collisions = extraction.collisions.len(),
        "extracted correction candidates"
    );
    extraction
}
