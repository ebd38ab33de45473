//! Property-based tests for Cardcheck.
//!
//! These tests use proptest to generate random inputs and verify that the
//! rule engine and the correction pipeline keep their invariants.
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p cardcheck --test property_tests
//!
//! # Run with more cases (slower but more thorough)
//! PROPTEST_CASES=10000 cargo test -p cardcheck --test property_tests
//! ```

use indexmap::IndexMap;
use proptest::prelude::*;

use cardcheck::oracle::{
    CancelToken, CorrectionPipeline, MockOracle, PromptNormalizer, split_into_batches,
};
use cardcheck::report::{read_report_from, write_report_to};
use cardcheck::{
    AnomalyIndex, BatchConfig, DatasetScanner, IssueType, Record, RecordSet, RecordValidator,
    SuggestionMerger,
};

// =============================================================================
// Test Strategies
// =============================================================================

/// Capitalized surnames with no digits or punctuation.
fn clean_surname() -> impl Strategy<Value = String> {
    "[A-Z]{2,12}"
}

/// Arbitrary name-like text, including junk.
fn any_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .'!@#-]{0,20}"
}

fn card(id: &str, surname: &str, nationality: &str) -> Record {
    Record::new()
        .with("TD", id)
        .with("Last_Name", surname)
        .with("First Name", "Anna")
        .with("Nationality", nationality)
        .with("Religion", "Christian")
        .with("Birth Place", "Wien")
}

fn issues_for(record: &Record) -> Vec<(String, IssueType)> {
    RecordValidator::new()
        .validate_record(record, 0)
        .unwrap()
        .into_iter()
        .map(|a| (a.field, a.issue_type))
        .collect()
}

// =============================================================================
// Validator properties
// =============================================================================

proptest! {
    #[test]
    fn surname_with_digit_is_flagged(
        prefix in clean_surname(),
        digit in 0u8..10,
        suffix in "[A-Z]{0,5}",
    ) {
        let surname = format!("{}{}{}", prefix, digit, suffix);
        let anomalies = RecordValidator::new()
            .validate_record(&card("1", &surname, "german"), 0)
            .unwrap();

        let found = anomalies
            .iter()
            .find(|a| a.issue_type == IssueType::ContainsNumbers && a.field == "Last_Name");
        prop_assert!(found.is_some());
        prop_assert!((found.unwrap().confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn blank_surname_yields_single_empty_field(spaces in " {0,6}") {
        let issues = issues_for(&card("1", &spaces, "german"));
        let surname_issues: Vec<_> = issues.iter().filter(|(f, _)| f == "Last_Name").collect();

        prop_assert_eq!(surname_issues.len(), 1);
        prop_assert_eq!(surname_issues[0].1, IssueType::EmptyRequiredField);
    }

    #[test]
    fn null_surname_yields_single_missing_field(id in "[0-9]{1,6}") {
        let record = card(&id, "MEIER", "german").with_null("Last_Name");
        let issues = issues_for(&record);
        let surname_issues: Vec<_> = issues.iter().filter(|(f, _)| f == "Last_Name").collect();

        prop_assert_eq!(surname_issues.len(), 1);
        prop_assert_eq!(surname_issues[0].1, IssueType::MissingRequiredField);
    }

    #[test]
    fn nationality_check_ignores_case(upper in proptest::collection::vec(any::<bool>(), 6)) {
        let nationality: String = "german"
            .chars()
            .zip(upper)
            .map(|(c, up)| if up { c.to_ascii_uppercase() } else { c })
            .collect();
        let issues = issues_for(&card("1", "MEIER", &format!("  {} ", nationality)));
        prop_assert!(issues.iter().all(|(_, i)| *i != IssueType::UnknownNationality));
    }

    #[test]
    fn validator_never_panics(surname in any_name(), nationality in any_name()) {
        let record = card("1", &surname, &nationality);
        let first = RecordValidator::new().validate_record(&record, 0).unwrap();
        let second = RecordValidator::new().validate_record(&record, 0).unwrap();
        prop_assert_eq!(first, second);
    }
}

// =============================================================================
// Scanner properties
// =============================================================================

proptest! {
    #[test]
    fn scanner_indexes_exactly_the_flagged_records(
        flags in proptest::collection::vec(any::<bool>(), 1..40),
    ) {
        let records: Vec<Record> = flags
            .iter()
            .enumerate()
            .map(|(i, bad)| {
                let nationality = if *bad { "unknownland" } else { "german" };
                card(&i.to_string(), "MEIER", nationality)
            })
            .collect();
        let headers = records[0].iter().map(|(k, _)| k.to_string()).collect();
        let set = RecordSet::new("TD", headers, records);

        let scanner = DatasetScanner::new();
        let index = scanner.scan(&set);
        let expected = flags.iter().filter(|b| **b).count();

        prop_assert_eq!(index.len(), expected);
        prop_assert_eq!(index.total_anomalies(), expected);
        prop_assert_eq!(scanner.scan(&set), index);
    }

    #[test]
    fn report_round_trip_keeps_confidence(
        scores in proptest::collection::vec(0.0f64..75.0, 1..20),
    ) {
        let records: Vec<Record> = scores
            .iter()
            .enumerate()
            .map(|(i, score)| {
                card(&i.to_string(), "MEIER", "german")
                    .with("Automatic Validation", "To be validated")
                    .with("Overall Confidence OCR", format!("{:.2}", score))
            })
            .collect();
        let headers = records[0].iter().map(|(k, _)| k.to_string()).collect();
        let index = DatasetScanner::new().scan(&RecordSet::new("TD", headers, records));

        let mut buffer = Vec::new();
        write_report_to(&mut buffer, &index.to_report_rows()).unwrap();
        let rows = read_report_from(buffer.as_slice()).unwrap();
        let rebuilt = AnomalyIndex::from_report_rows(&rows).unwrap();

        prop_assert_eq!(rebuilt.len(), index.len());
        for (id, anomalies) in index.iter() {
            let restored = rebuilt.get(id).unwrap();
            for (a, b) in anomalies.iter().zip(restored) {
                prop_assert_eq!(a.issue_type, b.issue_type);
                prop_assert!((a.confidence - b.confidence).abs() <= 0.001);
            }
        }
    }
}

// =============================================================================
// Pipeline and merge properties
// =============================================================================

fn candidates(n: usize) -> IndexMap<String, String> {
    (0..n).map(|i| (i.to_string(), format!("value{}", i))).collect()
}

proptest! {
    #[test]
    fn batches_cover_every_candidate(n in 0usize..200, size in 1usize..50) {
        let map = candidates(n);
        let batches = split_into_batches(&map, size);

        prop_assert_eq!(batches.len(), n.div_ceil(size));
        prop_assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= size));
        let keys: Vec<&String> = batches.iter().flat_map(|b| b.entries.keys()).collect();
        let expected: Vec<&String> = map.keys().collect();
        prop_assert_eq!(keys, expected);
    }

    #[test]
    fn merge_is_idempotent(n in 1usize..30, every in 1usize..5) {
        let records: Vec<Record> =
            (0..n).map(|i| card(&i.to_string(), "MEIER", "deutsch")).collect();
        let headers = records[0].iter().map(|(k, _)| k.to_string()).collect();
        let set = RecordSet::new("TD", headers, records);
        let suggestions: IndexMap<String, String> = (0..n)
            .step_by(every)
            .map(|i| (i.to_string(), "german".to_string()))
            .collect();

        let merger = SuggestionMerger::new();
        let once = merger.merge_records(&set, &suggestions);
        let twice = merger.merge_records(&once, &suggestions);

        prop_assert_eq!(once.records(), twice.records());
        prop_assert_eq!(once.headers(), twice.headers());
        for (original, merged) in set.iter().zip(once.iter()) {
            prop_assert_eq!(original.get("Nationality"), merged.get("Nationality"));
        }
    }
}

#[test]
fn failed_middle_chunk_loses_only_its_keys() {
    let map = candidates(45);
    let oracle = MockOracle::responder(|prompt| {
        if prompt.contains("\"value20\"") {
            Err(cardcheck::CardcheckError::Oracle("boom".to_string()))
        } else {
            let input = prompt.rsplit("Input: ").next().unwrap_or_default();
            let object = input.trim_end_matches("Output:").trim();
            Ok(object.to_string())
        }
    });
    let normalizer = PromptNormalizer::new(oracle, "things");
    let pipeline = CorrectionPipeline::new(BatchConfig::uncapped()).unwrap();

    let vocabulary = vec!["value".to_string()];
    let suggestions = pipeline.normalize(&normalizer, &map, &vocabulary).unwrap();

    assert_eq!(suggestions.len(), 25);
    assert!((20..40).all(|i| !suggestions.contains_key(&i.to_string())));
    assert!(suggestions.contains_key("0"));
    assert!(suggestions.contains_key("44"));
    assert_eq!(normalizer.oracle().calls(), 3);
}

#[test]
fn unparseable_reply_fails_only_its_chunk() {
    let map = candidates(45);
    let oracle = MockOracle::responder(|prompt| {
        if prompt.contains("\"value40\"") {
            Ok("I cannot help with that.".to_string())
        } else {
            let input = prompt.rsplit("Input: ").next().unwrap_or_default();
            Ok(input.trim_end_matches("Output:").trim().to_string())
        }
    });
    let normalizer = PromptNormalizer::new(oracle, "things");
    let pipeline = CorrectionPipeline::new(BatchConfig::uncapped()).unwrap();

    let vocabulary = vec!["value".to_string()];
    let run = pipeline.run(&normalizer, &map, &vocabulary, &CancelToken::new());

    assert_eq!(run.chunks_total, 3);
    assert_eq!(run.chunks_succeeded, 2);
    assert_eq!(run.failed_chunks.len(), 1);
    assert_eq!(run.failed_chunks[0].index, 2);
    assert_eq!(run.failed_chunks[0].reason, "unparseable reply");
    assert_eq!(run.suggestions.len(), 40);
    assert!((40..45).all(|i| !run.suggestions.contains_key(&i.to_string())));
    assert_eq!(run.suggestions.get("39").map(String::as_str), Some("value39"));
}
