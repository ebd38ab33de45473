//! Anomaly taxonomy and value objects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CardcheckError;

/// Which rule produced an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// Required field has no value at all.
    MissingRequiredField,
    /// Required field is present but blank after trimming.
    EmptyRequiredField,
    /// Surname is not written in capitals.
    NotCapitalized,
    /// Name contains digits (typical OCR artifact).
    ContainsNumbers,
    /// Name contains punctuation or symbols.
    SuspiciousCharacters,
    /// Name shorter than two characters.
    TooShort,
    /// Surname carries a maiden-name marker such as "geb.".
    ContainsMaidenNameIndicator,
    /// Nationality outside the controlled vocabulary.
    UnknownNationality,
    /// Religion outside the controlled vocabulary.
    UnknownReligion,
    /// Birth date unparseable or implausible.
    InvalidFormat,
    /// OCR confidence below threshold.
    LowConfidence,
}

impl IssueType {
    /// All issue types, in declaration order.
    pub const ALL: [IssueType; 11] = [
        IssueType::MissingRequiredField,
        IssueType::EmptyRequiredField,
        IssueType::NotCapitalized,
        IssueType::ContainsNumbers,
        IssueType::SuspiciousCharacters,
        IssueType::TooShort,
        IssueType::ContainsMaidenNameIndicator,
        IssueType::UnknownNationality,
        IssueType::UnknownReligion,
        IssueType::InvalidFormat,
        IssueType::LowConfidence,
    ];

    /// The tag used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::MissingRequiredField => "missing_required_field",
            IssueType::EmptyRequiredField => "empty_required_field",
            IssueType::NotCapitalized => "not_capitalized",
            IssueType::ContainsNumbers => "contains_numbers",
            IssueType::SuspiciousCharacters => "suspicious_characters",
            IssueType::TooShort => "too_short",
            IssueType::ContainsMaidenNameIndicator => "contains_maiden_name_indicator",
            IssueType::UnknownNationality => "unknown_nationality",
            IssueType::UnknownReligion => "unknown_religion",
            IssueType::InvalidFormat => "invalid_format",
            IssueType::LowConfidence => "low_confidence",
        }
    }

    /// Rule author's certainty that the condition is a real defect.
    ///
    /// `LowConfidence` has no fixed value; its anomalies carry the OCR score.
    pub fn rule_confidence(&self) -> f64 {
        match self {
            IssueType::MissingRequiredField | IssueType::EmptyRequiredField => 1.0,
            IssueType::NotCapitalized | IssueType::UnknownReligion => 0.8,
            IssueType::ContainsNumbers
            | IssueType::SuspiciousCharacters
            | IssueType::TooShort => 0.9,
            IssueType::ContainsMaidenNameIndicator | IssueType::UnknownNationality => 0.7,
            IssueType::InvalidFormat => 0.95,
            IssueType::LowConfidence => 0.0,
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = CardcheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        IssueType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| CardcheckError::Config(format!("unknown issue type '{}'", tag)))
    }
}

/// A finding that one field of one record is suspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Field the finding applies to.
    pub field: String,
    /// Offending value as seen by the rule.
    pub value: String,
    /// Rule that fired.
    pub issue_type: IssueType,
    /// Certainty in [0, 1]; for reporting and sorting only.
    pub confidence: f64,
    /// Candidate replacements, if any were produced alongside the finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl Anomaly {
    /// Create an anomaly with the rule's fixed confidence.
    pub fn new(field: impl Into<String>, value: impl Into<String>, issue_type: IssueType) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            issue_type,
            confidence: issue_type.rule_confidence(),
            suggestions: None,
        }
    }

    /// Override the confidence, clamped into [0, 1].
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Confidence rendered as a report percentage, e.g. `"95.0%"`.
    pub fn confidence_percentage(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}
