//! Field validators: one family of fixed rules per semantic field.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::input::Record;

use super::anomaly::{Anomaly, IssueType};

/// Trait for field validators.
///
/// Validators only read the record; they keep no state between calls.
pub trait FieldValidator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Inspect one record and return findings in rule order.
    fn validate(&self, record: &Record) -> Vec<Anomaly>;
}

/// Shared character checks for name fields.
#[derive(Debug, Clone)]
struct NameRules {
    suspicious: HashSet<char>,
}

impl NameRules {
    fn new(config: &ValidatorConfig) -> Self {
        Self {
            suspicious: config.suspicious_chars.chars().collect(),
        }
    }

    /// Any numeric character, not only ASCII digits.
    fn has_digit(value: &str) -> bool {
        value.chars().any(char::is_numeric)
    }

    fn has_suspicious(&self, value: &str) -> bool {
        value.chars().any(|c| self.suspicious.contains(&c))
    }

    /// Presence checks shared by both name fields. Returns the trimmed value
    /// when the content rules should run.
    fn presence<'a>(
        record: &'a Record,
        column: &str,
        anomalies: &mut Vec<Anomaly>,
    ) -> Option<&'a str> {
        match record.get(column) {
            None => {
                anomalies.push(Anomaly::new(column, "", IssueType::MissingRequiredField));
                None
            }
            Some(raw) => {
                let value = raw.trim();
                if value.is_empty() {
                    anomalies.push(Anomaly::new(column, "", IssueType::EmptyRequiredField));
                    None
                } else {
                    Some(value)
                }
            }
        }
    }
}

/// True when the text has at least one cased letter and none in lowercase.
fn is_all_uppercase(value: &str) -> bool {
    value.chars().any(char::is_uppercase) && !value.chars().any(char::is_lowercase)
}

/// Validates the primary surname field.
#[derive(Debug, Clone)]
pub struct SurnameValidator {
    column: String,
    rules: NameRules,
    maiden_indicators: Vec<String>,
}

impl SurnameValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            column: config.columns.last_name.clone(),
            rules: NameRules::new(config),
            maiden_indicators: config
                .maiden_name_indicators
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }
}

impl FieldValidator for SurnameValidator {
    fn name(&self) -> &'static str {
        "surname"
    }

    fn validate(&self, record: &Record) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        let Some(name) = NameRules::presence(record, &self.column, &mut anomalies) else {
            return anomalies;
        };

        // Archival convention: surnames are typed in capitals.
        if !is_all_uppercase(name) {
            anomalies.push(Anomaly::new(&self.column, name, IssueType::NotCapitalized));
        }
        if NameRules::has_digit(name) {
            anomalies.push(Anomaly::new(&self.column, name, IssueType::ContainsNumbers));
        }
        if self.rules.has_suspicious(name) {
            anomalies.push(Anomaly::new(&self.column, name, IssueType::SuspiciousCharacters));
        }
        if name.chars().count() < 2 {
            anomalies.push(Anomaly::new(&self.column, name, IssueType::TooShort));
        }

        let lowered = name.to_lowercase();
        if self
            .maiden_indicators
            .iter()
            .any(|indicator| lowered.contains(indicator.as_str()))
        {
            anomalies.push(Anomaly::new(
                &self.column,
                name,
                IssueType::ContainsMaidenNameIndicator,
            ));
        }

        anomalies
    }
}

/// Validates the given-name field with the lenient rule set.
#[derive(Debug, Clone)]
pub struct GivenNameValidator {
    column: String,
    rules: NameRules,
}

impl GivenNameValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            column: config.columns.first_name.clone(),
            rules: NameRules::new(config),
        }
    }
}

impl FieldValidator for GivenNameValidator {
    fn name(&self) -> &'static str {
        "given_name"
    }

    fn validate(&self, record: &Record) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        let Some(name) = NameRules::presence(record, &self.column, &mut anomalies) else {
            return anomalies;
        };

        if NameRules::has_digit(name) {
            anomalies.push(Anomaly::new(&self.column, name, IssueType::ContainsNumbers));
        }
        if self.rules.has_suspicious(name) {
            anomalies.push(Anomaly::new(&self.column, name, IssueType::SuspiciousCharacters));
        }

        anomalies
    }
}

/// Checks nationality against the controlled vocabulary.
#[derive(Debug, Clone)]
pub struct NationalityValidator {
    column: String,
    known: HashSet<String>,
}

impl NationalityValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            column: config.columns.nationality.clone(),
            known: config
                .nationalities
                .iter()
                .map(|n| n.trim().to_lowercase())
                .collect(),
        }
    }
}

impl FieldValidator for NationalityValidator {
    fn name(&self) -> &'static str {
        "nationality"
    }

    fn validate(&self, record: &Record) -> Vec<Anomaly> {
        let Some(raw) = record.get(&self.column) else {
            return Vec::new();
        };

        let normalized = raw.trim().to_lowercase();
        if self.known.contains(&normalized) {
            Vec::new()
        } else {
            vec![Anomaly::new(
                &self.column,
                normalized,
                IssueType::UnknownNationality,
            )]
        }
    }
}

/// Validates the free-text birth date.
#[derive(Debug, Clone)]
pub struct BirthDateValidator {
    column: String,
    label: String,
    min_year: i32,
    max_year: i32,
}

impl BirthDateValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            column: config.columns.birth_date.clone(),
            label: config.columns.birth_date_label.clone(),
            min_year: config.min_birth_year,
            max_year: config.max_birth_year,
        }
    }
}

impl FieldValidator for BirthDateValidator {
    fn name(&self) -> &'static str {
        "birth_date"
    }

    fn validate(&self, record: &Record) -> Vec<Anomaly> {
        let Some(raw) = record.get(&self.column) else {
            return Vec::new();
        };
        let value = raw.trim();

        // "//" is the card's "no date" marker; "//1885" records the year only.
        if value.is_empty() || value.starts_with("//") || !value.contains('/') {
            return Vec::new();
        }

        let flagged = match parse_card_date(value) {
            Some(date) => !(self.min_year..=self.max_year).contains(&date.year()),
            // Three well-placed slots are tolerated even if the date is not real.
            None => value.matches('/').count() != 2,
        };

        if flagged {
            vec![Anomaly::new(&self.label, value, IssueType::InvalidFormat)]
        } else {
            Vec::new()
        }
    }
}

/// Parse `day/month/year`, requiring a four-digit year.
fn parse_card_date(value: &str) -> Option<NaiveDate> {
    let year = value.rsplit('/').next()?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%d/%m/%Y").ok()
}

/// Checks religion against the controlled vocabulary.
#[derive(Debug, Clone)]
pub struct ReligionValidator {
    column: String,
    known: HashSet<String>,
}

impl ReligionValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            column: config.columns.religion.clone(),
            known: config
                .religions
                .iter()
                .map(|r| r.trim().to_lowercase())
                .collect(),
        }
    }
}

impl FieldValidator for ReligionValidator {
    fn name(&self) -> &'static str {
        "religion"
    }

    fn validate(&self, record: &Record) -> Vec<Anomaly> {
        let Some(raw) = record.get(&self.column) else {
            return Vec::new();
        };

        if self.known.contains(&raw.trim().to_lowercase()) {
            Vec::new()
        } else {
            vec![Anomaly::new(&self.column, raw, IssueType::UnknownReligion)]
        }
    }
}

/// Flags a missing birthplace. Content is not checked.
#[derive(Debug, Clone)]
pub struct BirthPlaceValidator {
    column: String,
}

impl BirthPlaceValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            column: config.columns.birth_place.clone(),
        }
    }
}

impl FieldValidator for BirthPlaceValidator {
    fn name(&self) -> &'static str {
        "birth_place"
    }

    fn validate(&self, record: &Record) -> Vec<Anomaly> {
        if record.get(&self.column).is_none() {
            vec![Anomaly::new(&self.column, "", IssueType::MissingRequiredField)]
        } else {
            Vec::new()
        }
    }
}

/// Flags low OCR scores on records still awaiting validation.
#[derive(Debug, Clone)]
pub struct OcrConfidenceValidator {
    status_column: String,
    pending_status: String,
    score_column: String,
    label: String,
    threshold: f64,
}

impl OcrConfidenceValidator {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            status_column: config.columns.validation_status.clone(),
            pending_status: config.pending_validation_status.clone(),
            score_column: config.columns.ocr_confidence.clone(),
            label: config.columns.ocr_confidence_label.clone(),
            threshold: config.min_ocr_confidence,
        }
    }

    /// Whether the record is still awaiting manual validation.
    pub fn applies_to(&self, record: &Record) -> bool {
        record
            .get(&self.status_column)
            .is_some_and(|status| status == self.pending_status)
    }
}

impl FieldValidator for OcrConfidenceValidator {
    fn name(&self) -> &'static str {
        "ocr_confidence"
    }

    fn validate(&self, record: &Record) -> Vec<Anomaly> {
        if !self.applies_to(record) {
            return Vec::new();
        }
        let Some(raw) = record.get(&self.score_column) else {
            return Vec::new();
        };

        let text = raw.trim();
        let score = match text.trim_end_matches('%').trim().parse::<f64>() {
            Ok(score) if score.is_finite() => score,
            _ => {
                debug!(value = text, "unparseable OCR confidence score");
                return Vec::new();
            }
        };

        if score < self.threshold {
            // Scores are percentages; the anomaly carries the score itself.
            vec![Anomaly::new(&self.label, text, IssueType::LowConfidence)
                .with_confidence(score / 100.0)]
        } else {
            Vec::new()
        }
    }
}
