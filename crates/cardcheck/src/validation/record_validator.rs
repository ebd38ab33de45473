//! Record validator: runs every field validator over one record.

use tracing::debug;

use crate::config::ValidatorConfig;
use crate::error::{CardcheckError, Result};
use crate::input::Record;

use super::anomaly::Anomaly;
use super::validators::{
    BirthDateValidator, BirthPlaceValidator, FieldValidator, GivenNameValidator,
    NationalityValidator, OcrConfidenceValidator, ReligionValidator, SurnameValidator,
};

/// Orchestrates the field validators in a fixed order.
///
/// The order (OCR confidence, names, nationality, dates, religion, location)
/// only affects the order of the returned anomalies.
pub struct RecordValidator {
    config: ValidatorConfig,
    validators: Vec<Box<dyn FieldValidator>>,
}

impl RecordValidator {
    /// Create a validator with the default rule configuration.
    pub fn new() -> Self {
        Self::with_config(ValidatorConfig::default())
    }

    /// Create a validator with custom vocabularies and thresholds.
    pub fn with_config(config: ValidatorConfig) -> Self {
        let validators: Vec<Box<dyn FieldValidator>> = vec![
            Box::new(OcrConfidenceValidator::new(&config)),
            Box::new(SurnameValidator::new(&config)),
            Box::new(GivenNameValidator::new(&config)),
            Box::new(NationalityValidator::new(&config)),
            Box::new(BirthDateValidator::new(&config)),
            Box::new(ReligionValidator::new(&config)),
            Box::new(BirthPlaceValidator::new(&config)),
        ];

        Self { config, validators }
    }

    /// The configuration the rules were built from.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate one record.
    ///
    /// `row` describes the record in logs and in the error raised when its
    /// identifier is missing.
    pub fn validate_record(&self, record: &Record, row: usize) -> Result<Vec<Anomaly>> {
        let id_column = &self.config.columns.id;
        if record.get(id_column).is_none_or(|id| id.trim().is_empty()) {
            return Err(CardcheckError::MissingIdentifier {
                row,
                column: id_column.clone(),
            });
        }

        let mut anomalies = Vec::new();
        for validator in &self.validators {
            let found = validator.validate(record);
            if !found.is_empty() {
                debug!(validator = validator.name(), row, anomalies = found.len(), "field flagged");
            }
            anomalies.extend(found);
        }
        Ok(anomalies)
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new()
    }
}
