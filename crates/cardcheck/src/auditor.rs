//! Main auditor struct and public API.

use std::path::Path;

use tracing::info;

use crate::config::{BatchConfig, ValidatorConfig};
use crate::error::{CardcheckError, Result};
use crate::extract::{Extraction, extract};
use crate::input::{Parser, ParserConfig, RecordSet, SourceMetadata};
use crate::merge::SuggestionMerger;
use crate::oracle::{CancelToken, ChunkNormalizer, CorrectionPipeline, NormalizationRun};
use crate::report::{ReportRow, SuggestionRow};
use crate::scan::{AnomalyIndex, DatasetScanner, ScanSummary};
use crate::validation::IssueType;

/// Configuration for an audit.
#[derive(Debug, Clone, Default)]
pub struct AuditorConfig {
    /// Parser configuration. Its identifier column follows the validator's.
    pub parser: ParserConfig,
    /// Rule vocabularies and thresholds.
    pub validator: ValidatorConfig,
    /// Chunking of oracle requests.
    pub batch: BatchConfig,
}

/// Result of scanning a record store.
#[derive(Debug, Clone)]
pub struct AuditResult {
    /// Metadata about the source file, when read from disk.
    pub source: Option<SourceMetadata>,
    /// The records that were scanned.
    pub records: RecordSet,
    /// Sparse anomaly index.
    pub index: AnomalyIndex,
    /// Summary statistics.
    pub summary: ScanSummary,
    /// Flattened anomaly report.
    pub rows: Vec<ReportRow>,
    /// Source rows skipped for lacking an identifier.
    pub skipped_rows: Vec<usize>,
}

/// Result of a suggestion pass for one issue type.
#[derive(Debug, Clone)]
pub struct SuggestionOutcome {
    pub issue_type: IssueType,
    /// Candidates sent to the oracle.
    pub extraction: Extraction,
    /// Per-chunk outcome and accumulated suggestions.
    pub run: NormalizationRun,
    /// Suggestion artifact rows.
    pub rows: Vec<SuggestionRow>,
    /// Records with the advisory column attached.
    pub records: RecordSet,
}

/// Ties together parsing, scanning, extraction, normalization and merging.
pub struct Auditor {
    config: AuditorConfig,
    parser: Parser,
    scanner: DatasetScanner,
    pipeline: CorrectionPipeline,
    merger: SuggestionMerger,
}

impl Auditor {
    /// Create an auditor with default configuration.
    pub fn new() -> Self {
        let config = AuditorConfig::default();
        Self {
            parser: Parser::with_config(config.parser.clone()),
            scanner: DatasetScanner::with_config(config.validator.clone()),
            pipeline: CorrectionPipeline::default(),
            merger: SuggestionMerger::new(),
            config,
        }
    }

    /// Create an auditor with custom configuration.
    pub fn with_config(mut config: AuditorConfig) -> Result<Self> {
        config.validator.validate()?;
        config.parser.id_column = config.validator.columns.id.clone();

        Ok(Self {
            parser: Parser::with_config(config.parser.clone()),
            scanner: DatasetScanner::with_config(config.validator.clone()),
            pipeline: CorrectionPipeline::new(config.batch.clone())?,
            merger: SuggestionMerger::new(),
            config,
        })
    }

    /// Use a custom advisory column name when merging.
    pub fn with_merger(mut self, merger: SuggestionMerger) -> Self {
        self.merger = merger;
        self
    }

    pub fn config(&self) -> &AuditorConfig {
        &self.config
    }

    /// Read a record store and scan it.
    pub fn scan_file(&self, path: impl AsRef<Path>) -> Result<AuditResult> {
        let (records, source) = self.parser.parse_file(path)?;
        Ok(self.scan_with_source(records, Some(source)))
    }

    /// Scan an in-memory record set.
    pub fn scan_records(&self, records: RecordSet) -> AuditResult {
        self.scan_with_source(records, None)
    }

    fn scan_with_source(&self, records: RecordSet, source: Option<SourceMetadata>) -> AuditResult {
        let scan = self.scanner.scan_detailed(&records);
        let summary = scan.index.summary();
        let rows = scan.index.to_report_rows();

        AuditResult {
            source,
            records,
            index: scan.index,
            summary,
            rows,
            skipped_rows: scan.skipped_rows,
        }
    }

    /// Controlled vocabulary the validator uses for an issue type, if any.
    pub fn vocabulary_for(&self, issue_type: IssueType) -> Option<&[String]> {
        match issue_type {
            IssueType::UnknownNationality => Some(&self.config.validator.nationalities),
            IssueType::UnknownReligion => Some(&self.config.validator.religions),
            _ => None,
        }
    }

    /// Ask the oracle for corrections of every value flagged with `issue_type`,
    /// using the validator's vocabulary for that issue type.
    pub fn suggest(
        &self,
        result: &AuditResult,
        normalizer: &dyn ChunkNormalizer,
        issue_type: IssueType,
        cancel: &CancelToken,
    ) -> Result<SuggestionOutcome> {
        let vocabulary = self.vocabulary_for(issue_type).ok_or_else(|| {
            CardcheckError::Config(format!(
                "no controlled vocabulary for issue type '{}'",
                issue_type
            ))
        })?;
        Ok(self.suggest_with_vocabulary(result, normalizer, issue_type, vocabulary, cancel))
    }

    /// Same as [`Auditor::suggest`] with an explicit vocabulary.
    pub fn suggest_with_vocabulary(
        &self,
        result: &AuditResult,
        normalizer: &dyn ChunkNormalizer,
        issue_type: IssueType,
        vocabulary: &[String],
        cancel: &CancelToken,
    ) -> SuggestionOutcome {
        let extraction = extract(&result.rows, issue_type);
        let run = self
            .pipeline
            .run(normalizer, &extraction.values, vocabulary, cancel);
        self.finish(result, issue_type, extraction, run)
    }

    /// Continue a run whose chunks were deferred by the chunk cap.
    pub fn resume(
        &self,
        result: &AuditResult,
        normalizer: &dyn ChunkNormalizer,
        outcome: SuggestionOutcome,
        vocabulary: &[String],
        cancel: &CancelToken,
    ) -> SuggestionOutcome {
        let run = self.pipeline.resume(normalizer, outcome.run, vocabulary, cancel);
        self.finish(result, outcome.issue_type, outcome.extraction, run)
    }

    fn finish(
        &self,
        result: &AuditResult,
        issue_type: IssueType,
        extraction: Extraction,
        run: NormalizationRun,
    ) -> SuggestionOutcome {
        let rows = self.merger.merge_rows(&result.rows, &run.suggestions);
        let records = self.merger.merge_records(&result.records, &run.suggestions);
        info!(
            issue_type = %issue_type,
            candidates = extraction.len(),
            resolved = run.suggestions.len(),
            failed_chunks = run.failed_chunks.len(),
            deferred_chunks = run.deferred.len(),
            "suggestion pass finished"
        );

        SuggestionOutcome {
            issue_type,
            extraction,
            run,
            rows,
            records,
        }
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Record;
    use crate::oracle::{MockOracle, PromptNormalizer};

    fn records() -> RecordSet {
        let headers = ["TD", "Last_Name", "First Name", "Nationality", "Religion", "Birth Place"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        RecordSet::new(
            "TD",
            headers,
            vec![
                Record::new()
                    .with("TD", "1")
                    .with("Last_Name", "MEIER")
                    .with("First Name", "Anna")
                    .with("Nationality", "deutsch")
                    .with("Religion", "katholisch")
                    .with("Birth Place", "Bremen"),
                Record::new()
                    .with("TD", "2")
                    .with("Last_Name", "KOWALSKI")
                    .with("First Name", "Jan")
                    .with("Nationality", "polish")
                    .with("Religion", "Roman Catholic")
                    .with("Birth Place", "Lodz"),
            ],
        )
    }

    #[test]
    fn test_scan_records() {
        let auditor = Auditor::new();
        let result = auditor.scan_records(records());

        assert!(result.source.is_none());
        assert!(result.index.contains("1"));
        assert!(!result.index.contains("2"));
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.summary.total_anomalies, 2);
    }

    #[test]
    fn test_suggest_religions_uses_religion_vocabulary() {
        let auditor = Auditor::new();
        let result = auditor.scan_records(records());
        let oracle = MockOracle::scripted([r#"{"1": "Roman Catholic"}"#]);
        let normalizer = PromptNormalizer::new(oracle, "religions");

        let outcome = auditor
            .suggest(&result, &normalizer, IssueType::UnknownReligion, &CancelToken::new())
            .unwrap();

        assert_eq!(outcome.run.suggestions.get("1").map(String::as_str), Some("Roman Catholic"));
        let prompt = &normalizer.oracle().prompts()[0];
        assert!(prompt.contains("Orthodox Christian"));
        assert!(prompt.contains("katholisch"));
    }

    #[test]
    fn test_suggest_nationalities() {
        let auditor = Auditor::new();
        let result = auditor.scan_records(records());
        let oracle = MockOracle::scripted([r#"{"1": "german"}"#]);
        let normalizer = PromptNormalizer::new(oracle, "nationalities");

        let outcome = auditor
            .suggest(&result, &normalizer, IssueType::UnknownNationality, &CancelToken::new())
            .unwrap();

        assert_eq!(outcome.extraction.len(), 1);
        assert_eq!(outcome.run.suggestions.get("1").map(String::as_str), Some("german"));
        assert_eq!(outcome.records.get("1").unwrap().get("Suggestions"), Some("german"));
        assert_eq!(outcome.records.get("1").unwrap().get("Nationality"), Some("deutsch"));
        assert!(outcome.rows.iter().all(|r| r.suggestions.as_deref() == Some("german")));
    }

    #[test]
    fn test_suggest_without_vocabulary_is_rejected() {
        let auditor = Auditor::new();
        let result = auditor.scan_records(records());
        let normalizer = PromptNormalizer::new(MockOracle::scripted(["{}"]), "names");

        let err = auditor
            .suggest(&result, &normalizer, IssueType::TooShort, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, CardcheckError::Config(_)));
        assert_eq!(normalizer.oracle().calls(), 0);
    }

    #[test]
    fn test_parser_follows_validator_identifier_column() {
        let mut config = AuditorConfig::default();
        config.validator.columns.id = "Card".to_string();

        let auditor = Auditor::with_config(config).unwrap();
        assert_eq!(auditor.config().parser.id_column, "Card");
    }

    #[test]
    fn test_invalid_batch_config_rejected() {
        let config = AuditorConfig {
            batch: BatchConfig::default().with_chunk_size(0),
            ..AuditorConfig::default()
        };
        assert!(Auditor::with_config(config).is_err());
    }
}
