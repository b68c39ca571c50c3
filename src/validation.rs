//! Validation Support
//!
//! Create and update payloads implement [`Validatable`]. The schema binding runs it after
//! deserializing, before anything reaches the engine.
//!
//! ```rust,ignore
//! impl Validatable for CarCreate {
//!     fn validate(&self) -> Result<(), ValidationErrors> {
//!         let mut errors = ValidationErrors::new();
//!         errors.check(validators::validate_required("model", &self.model));
//!         errors.check(validators::validate_range("year", self.year, Some(1886), Some(2100)));
//!         errors.result()
//!     }
//! }
//! ```

use serde::Serialize;
use std::fmt;

use crate::errors::CrudError;

/// Validation error with field name and message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record the error of a failed check, if any.
    pub fn check(&mut self, outcome: Result<(), ValidationError>) {
        if let Err(error) = outcome {
            self.add(error);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// `Ok` when nothing was recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one check failed.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl From<ValidationErrors> for CrudError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors.errors.iter().map(ToString::to_string).collect())
    }
}

/// Types that can check their own field values.
pub trait Validatable {
    /// # Errors
    ///
    /// Every failed check, not just the first.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Helper validators for common patterns
pub mod validators {
    use super::ValidationError;
    use std::fmt;

    /// String length, counted in characters, within `min..=max`.
    ///
    /// # Errors
    ///
    /// When the length falls outside the bounds.
    pub fn validate_length(
        field: &str,
        value: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<(), ValidationError> {
        let len = value.chars().count();

        if let Some(min_len) = min
            && len < min_len
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at least {min_len} characters"),
            ));
        }

        if let Some(max_len) = max
            && len > max_len
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at most {max_len} characters"),
            ));
        }

        Ok(())
    }

    /// # Errors
    ///
    /// When `value` falls outside `min..=max`.
    pub fn validate_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: Option<T>,
        max: Option<T>,
    ) -> Result<(), ValidationError> {
        if let Some(min_val) = min
            && value < min_val
        {
            return Err(ValidationError::new(field, format!("Must be at least {min_val}")));
        }

        if let Some(max_val) = max
            && value > max_val
        {
            return Err(ValidationError::new(field, format!("Must be at most {max_val}")));
        }

        Ok(())
    }

    /// # Errors
    ///
    /// When `value` is empty or whitespace.
    pub fn validate_required(field: &str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "This field is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_collection() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.check(Ok(()));
        errors.check(Err(ValidationError::new("model", "required")));
        errors.add(ValidationError::new("year", "too old"));
        assert_eq!(errors.len(), 2);

        let err = errors.result().unwrap_err();
        let crud: CrudError = err.into();
        match crud {
            CrudError::Validation(messages) => {
                assert_eq!(messages, vec!["model: required", "year: too old"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_length() {
        use validators::validate_length;

        assert!(validate_length("model", "ab", Some(3), None).is_err());
        assert!(validate_length("model", "abcdef", None, Some(5)).is_err());
        assert!(validate_length("model", "abc", Some(3), Some(5)).is_ok());
        // characters, not bytes
        assert!(validate_length("model", "ééé", None, Some(3)).is_ok());
    }

    #[test]
    fn test_validate_range() {
        use validators::validate_range;

        assert!(validate_range("year", 1800, Some(1886), None).is_err());
        assert!(validate_range("year", 2200, None, Some(2100)).is_err());
        assert!(validate_range("year", 2020, Some(1886), Some(2100)).is_ok());
    }

    #[test]
    fn test_validate_required() {
        use validators::validate_required;

        assert!(validate_required("model", "").is_err());
        assert!(validate_required("model", "   ").is_err());
        assert!(validate_required("model", "Civic").is_ok());
    }
}
