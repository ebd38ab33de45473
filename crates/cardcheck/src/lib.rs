//! Cardcheck: rule-based quality auditing for transcribed archival record cards.
//!
//! Each record card is checked against a fixed set of field rules. Findings
//! are collected into a sparse anomaly index, flattened into a report, and the
//! categorical values that failed a vocabulary check can be sent to a
//! text-generation oracle for normalization suggestions.
//!
//! # Core Principles
//!
//! - **Non-destructive**: Original values are never modified; suggestions
//!   live in a separate advisory column
//! - **Deterministic rules**: Validation runs without any model involvement
//! - **Best-effort oracle**: A failed chunk loses only its own suggestions
//!
//! # Example
//!
//! ```no_run
//! use cardcheck::Auditor;
//!
//! let auditor = Auditor::new();
//! let result = auditor.scan_file("cards.csv").unwrap();
//!
//! println!("Flagged records: {}", result.summary.flagged_records);
//! println!("Anomalies: {}", result.summary.total_anomalies);
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod input;
pub mod merge;
pub mod oracle;
pub mod report;
pub mod scan;
pub mod validation;

mod auditor;

pub use crate::auditor::{AuditResult, Auditor, AuditorConfig, SuggestionOutcome};
pub use config::{BatchConfig, CapPolicy, ColumnNames, OracleConfig, ValidatorConfig};
pub use error::{CardcheckError, Result};
pub use extract::{Extraction, extract, extract_from_index};
pub use input::{Parser, ParserConfig, Record, RecordSet, SourceMetadata};
pub use merge::SuggestionMerger;
pub use report::{ReportRow, SuggestionRow};
pub use scan::{AnomalyIndex, DatasetScanner, Scan, ScanSummary};
pub use validation::{Anomaly, IssueType, RecordValidator};
