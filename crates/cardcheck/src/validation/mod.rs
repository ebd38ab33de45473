//! Validation engine for detecting suspect fields on record cards.

mod anomaly;
mod record_validator;
mod validators;

pub use anomaly::{Anomaly, IssueType};
pub use record_validator::RecordValidator;
pub use validators::{
    BirthDateValidator, BirthPlaceValidator, FieldValidator, GivenNameValidator,
    NationalityValidator, OcrConfidenceValidator, ReligionValidator, SurnameValidator,
};
