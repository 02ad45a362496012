//! Error types for the task store

use crate::types::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tasklist_runtime::StoreError;
use thiserror::Error;

/// Errors surfaced by task store operations
///
/// Failures are values: every variant is `Clone` so it can travel inside a
/// [`TaskAction`](crate::TaskAction) back to the caller that issued the command.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TaskError {
    /// Input failed local validation; no request was sent
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),

    /// The API refused the payload (HTTP 400/422)
    #[error("Rejected by server (status {status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The request never got a response (connection, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The API answered with any other non-success status
    #[error("Server error (status {status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// The API does not know the task (HTTP 404)
    #[error("Task {0} not found")]
    NotFound(TaskId),

    /// The task is not in the local cache; no request was sent
    #[error("Task {0} is not loaded")]
    NotFoundLocally(TaskId),

    /// A success response could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The store could not complete the request (shut down, timed out)
    #[error("Store error: {0}")]
    Store(String),
}

impl TaskError {
    /// Field errors, if this is a validation failure
    #[must_use]
    pub const fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Whether the failure came from the remote API or the network
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. }
                | Self::Network(_)
                | Self::Server { .. }
                | Self::NotFound(_)
                | Self::InvalidResponse(_)
        )
    }
}

impl From<ValidationErrors> for TaskError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StoreError> for TaskError {
    fn from(error: StoreError) -> Self {
        Self::Store(error.to_string())
    }
}

/// A validated task field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskField {
    /// The title
    Title,
    /// The description
    Description,
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Title => f.write_str("title"),
            Self::Description => f.write_str("description"),
        }
    }
}

/// Why a field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    /// Required and empty after trimming
    #[error("is required")]
    EmptyField,

    /// More characters than allowed
    #[error("must be at most {max} characters")]
    TooLong {
        /// Maximum character count
        max: usize,
    },

    /// Contains a character outside the allowed set
    #[error("contains characters that are not allowed")]
    InvalidCharacters,
}

/// A single rejected field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{field} {kind}")]
pub struct FieldError {
    /// Which field
    pub field: TaskField,
    /// What is wrong with it
    pub kind: ValidationErrorKind,
}

impl FieldError {
    /// Create a field error
    #[must_use]
    pub const fn new(field: TaskField, kind: ValidationErrorKind) -> Self {
        Self { field, kind }
    }
}

/// All field errors found in one input, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// No errors yet
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a rejected field
    pub fn push(&mut self, field: TaskField, kind: ValidationErrorKind) {
        self.0.push(FieldError::new(field, kind));
    }

    /// Whether nothing was rejected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of rejected fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The error recorded for `field`, if any
    #[must_use]
    pub fn get(&self, field: TaskField) -> Option<ValidationErrorKind> {
        self.0.iter().find(|e| e.field == field).map(|e| e.kind)
    }

    /// Iterate over the field errors
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// `Ok(value)` if nothing was rejected, otherwise `Err(self)`
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field error was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_display_every_field() {
        let mut errors = ValidationErrors::new();
        errors.push(TaskField::Title, ValidationErrorKind::EmptyField);
        errors.push(TaskField::Description, ValidationErrorKind::TooLong { max: 500 });

        assert_eq!(
            errors.to_string(),
            "title is required; description must be at most 500 characters"
        );
        assert_eq!(
            TaskError::from(errors).to_string(),
            "Invalid input: title is required; description must be at most 500 characters"
        );
    }

    #[test]
    fn into_result_depends_on_emptiness() {
        assert_eq!(ValidationErrors::new().into_result(3), Ok(3));

        let mut errors = ValidationErrors::new();
        errors.push(TaskField::Title, ValidationErrorKind::InvalidCharacters);
        assert_eq!(
            errors.get(TaskField::Title),
            Some(ValidationErrorKind::InvalidCharacters)
        );
        assert!(errors.into_result(3).is_err());
    }

    #[test]
    fn store_errors_convert() {
        let error = TaskError::from(StoreError::Timeout);
        assert!(matches!(error, TaskError::Store(_)));
        assert!(!error.is_remote());
        assert!(TaskError::NotFound(TaskId::new(1)).is_remote());
    }
}
