//! Request validation.
//!
//! The controller treats a record that fails [`ApiEntity::validate`](crate::entity::ApiEntity::validate)
//! the same way it treats a body that fails to deserialize: a 400 carrying one
//! line per problem.
//!
//! ```rust,ignore
//! fn validate(&self) -> Result<(), ValidationErrors> {
//!     let mut errors = ValidationErrors::new();
//!     errors.check(validators::validate_required("name", &self.name));
//!     errors.check(validators::validate_range("quantity", self.quantity, Some(0), None));
//!     errors.result()
//! }
//! ```

use serde::Serialize;
use std::fmt;

/// Validation error with field name and message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
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
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
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

    /// Append every error of `other`.
    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// Record the error of a failed check, ignore a passing one.
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

    /// One rendered line per error, as sent in the response `details`.
    #[must_use]
    pub fn details(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Convert to Result
    ///
    /// # Errors
    /// Returns `self` when at least one error was collected.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
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

/// Helper validators for common patterns
pub mod validators {
    use super::ValidationError;
    use std::fmt;

    /// Validate string length is within range
    ///
    /// # Errors
    /// Returns a [`ValidationError`] naming `field` when the length is out of bounds.
    pub fn validate_length(
        field: &str,
        value: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<(), ValidationError> {
        let len = value.chars().count();

        if let Some(min_len) = min {
            if len < min_len {
                return Err(ValidationError::new(
                    field,
                    format!("Must be at least {min_len} characters"),
                ));
            }
        }

        if let Some(max_len) = max {
            if len > max_len {
                return Err(ValidationError::new(
                    field,
                    format!("Must be at most {max_len} characters"),
                ));
            }
        }

        Ok(())
    }

    /// Validate number is within range
    ///
    /// # Errors
    /// Returns a [`ValidationError`] naming `field` when the value is out of bounds.
    pub fn validate_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: Option<T>,
        max: Option<T>,
    ) -> Result<(), ValidationError> {
        if let Some(min_val) = min {
            if value < min_val {
                return Err(ValidationError::new(
                    field,
                    format!("Must be at least {min_val}"),
                ));
            }
        }

        if let Some(max_val) = max {
            if value > max_val {
                return Err(ValidationError::new(
                    field,
                    format!("Must be at most {max_val}"),
                ));
            }
        }

        Ok(())
    }

    /// Validate value is not blank
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when `value` is empty or whitespace.
    pub fn validate_required(field: &str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "This field is required"));
        }
        Ok(())
    }
}
