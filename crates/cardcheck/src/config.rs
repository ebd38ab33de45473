//! Configuration for validation rules and the correction pipeline.
//!
//! Every vocabulary and threshold used by the field validators lives here so
//! that it can be swapped (from JSON or in tests) without touching rule code.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CardcheckError, Result};

/// Nationalities recognised on the record cards.
pub const DEFAULT_NATIONALITIES: &[&str] = &[
    "albanian",
    "argentinian",
    "australian",
    "austrian",
    "belgian",
    "brazilian",
    "canadian",
    "costa",
    "croatian",
    "czechoslovakian",
    "estonian",
    "french",
    "german",
    "greek",
    "hungarian",
    "israeli",
    "italian",
    "latvian",
    "lithuanian",
    "luxembourg",
    "dutch",
    "norwegian",
    "polish",
    "romanian",
    "russian",
    "slovakian",
    "slovenian",
    "south african",
    "spanish",
    "swedish",
    "swiss",
    "turkish",
    "ukrainian",
    "american",
    "uruguayan",
    "venezuelan",
    "yugoslavian",
    "stateless",
];

/// Religions recognised on the record cards.
pub const DEFAULT_RELIGIONS: &[&str] = &[
    "Christian",
    "Jewish",
    "Roman Catholic",
    "Orthodox Christian",
    "Muslim",
    "Buddhist",
    "Other",
];

/// Characters that should never appear in a name field.
pub const DEFAULT_SUSPICIOUS_CHARS: &str = "!@#$%^&*()_+=[]{}|\\;:\"<>?/0123456789";

/// Tokens indicating a maiden name was written into the surname field.
pub const DEFAULT_MAIDEN_NAME_INDICATORS: &[&str] = &["geb", "geb.", "geboren", "nee", "née"];

/// Column names of the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Unique record identifier.
    pub id: String,
    pub last_name: String,
    pub first_name: String,
    pub nationality: String,
    pub birth_date: String,
    /// Field label used in anomalies raised on the birth date.
    pub birth_date_label: String,
    pub religion: String,
    pub birth_place: String,
    /// Automatic-validation status column.
    pub validation_status: String,
    /// Overall OCR confidence score column (0-100).
    pub ocr_confidence: String,
    /// Field label used in low-confidence anomalies.
    pub ocr_confidence_label: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: "TD".to_string(),
            last_name: "Last_Name".to_string(),
            first_name: "First Name".to_string(),
            nationality: "Nationality".to_string(),
            birth_date: "Birthdate (Geb)".to_string(),
            birth_date_label: "Birthdate".to_string(),
            religion: "Religion".to_string(),
            birth_place: "Birth Place".to_string(),
            validation_status: "Automatic Validation".to_string(),
            ocr_confidence: "Overall Confidence OCR".to_string(),
            ocr_confidence_label: "OCR_Confidence".to_string(),
        }
    }
}

/// Configuration for the record validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Column names of the record store.
    pub columns: ColumnNames,
    /// Status value that enables the OCR confidence check.
    pub pending_validation_status: String,
    /// OCR scores below this value are flagged.
    pub min_ocr_confidence: f64,
    /// Characters flagged in name fields.
    pub suspicious_chars: String,
    /// Case-insensitive substrings marking a maiden name.
    pub maiden_name_indicators: Vec<String>,
    /// Accepted nationalities (compared lowercase).
    pub nationalities: Vec<String>,
    /// Accepted religions (compared case-insensitively).
    pub religions: Vec<String>,
    /// Earliest plausible birth year.
    pub min_birth_year: i32,
    /// Latest plausible birth year.
    pub max_birth_year: i32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            pending_validation_status: "To be validated".to_string(),
            min_ocr_confidence: 75.0,
            suspicious_chars: DEFAULT_SUSPICIOUS_CHARS.to_string(),
            maiden_name_indicators: to_strings(DEFAULT_MAIDEN_NAME_INDICATORS),
            nationalities: to_strings(DEFAULT_NATIONALITIES),
            religions: to_strings(DEFAULT_RELIGIONS),
            min_birth_year: 1800,
            max_birth_year: 1950,
        }
    }
}

impl ValidatorConfig {
    /// Load a configuration from a JSON file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| CardcheckError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: ValidatorConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that thresholds and ranges are coherent.
    pub fn validate(&self) -> Result<()> {
        if self.columns.id.trim().is_empty() {
            return Err(CardcheckError::Config(
                "identifier column name must not be empty".to_string(),
            ));
        }
        if self.min_birth_year > self.max_birth_year {
            return Err(CardcheckError::Config(format!(
                "birth year range is inverted: {} > {}",
                self.min_birth_year, self.max_birth_year
            )));
        }
        if !self.min_ocr_confidence.is_finite() {
            return Err(CardcheckError::Config(
                "min_ocr_confidence must be a finite number".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the nationality vocabulary.
    pub fn with_nationalities<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nationalities = values.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the religion vocabulary.
    pub fn with_religions<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.religions = values.into_iter().map(Into::into).collect();
        self
    }

    /// Set the OCR confidence threshold.
    pub fn with_min_ocr_confidence(mut self, threshold: f64) -> Self {
        self.min_ocr_confidence = threshold;
        self
    }
}

/// What happens to chunks that a run does not get to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapPolicy {
    /// Hand unprocessed chunks back so a later run can resume them.
    #[default]
    Defer,
    /// Discard unprocessed chunks.
    Drop,
}

/// Configuration for chunked oracle normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum entries per chunk.
    pub chunk_size: usize,
    /// Maximum chunks sent to the oracle per run (None = all).
    pub max_chunks: Option<usize>,
    /// Fate of chunks beyond the cap or skipped by cancellation.
    pub cap_policy: CapPolicy,
    /// Maximum concurrent oracle calls (1 = sequential).
    pub max_in_flight: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 20,
            max_chunks: Some(4),
            cap_policy: CapPolicy::Defer,
            max_in_flight: 1,
        }
    }
}

impl BatchConfig {
    /// A configuration without a chunk cap.
    pub fn uncapped() -> Self {
        Self {
            max_chunks: None,
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_max_chunks(mut self, max: Option<usize>) -> Self {
        self.max_chunks = max;
        self
    }

    pub fn with_cap_policy(mut self, policy: CapPolicy) -> Self {
        self.cap_policy = policy;
        self
    }

    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n;
        self
    }

    /// Reject sizes that would make no progress.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(CardcheckError::Config(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(CardcheckError::Config(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the local text-generation service.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Model name (e.g., "gemma:7b").
    pub model: String,
    /// Generation endpoint.
    pub api_url: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// HTTP timeout; None waits indefinitely.
    pub timeout: Option<Duration>,
    /// Plural noun describing the values being normalized.
    pub subject: String,
}

/// Default Ollama generate endpoint.
pub const DEFAULT_ORACLE_URL: &str = "http://localhost:11434/api/generate";

impl Default for OracleConfig {
    fn default() -> Self {
        let api_url = std::env::var("OLLAMA_HOST")
            .map(|host| format!("{}/api/generate", host.trim_end_matches('/')))
            .unwrap_or_else(|_| DEFAULT_ORACLE_URL.to_string());

        Self {
            model: "gemma:7b".to_string(),
            api_url,
            temperature: 0.0,
            timeout: Some(Duration::from_secs(120)),
            subject: "nationalities".to_string(),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
