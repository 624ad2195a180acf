//! # Error Types
//!
//! Validation errors raised before any storage access.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mercado-core errors (this file)                                       │
//! │  └── ValidationError  - Bad input, rejected locally                    │
//! │                                                                         │
//! │  mercado-db errors (separate crate)                                    │
//! │  └── DbError          - Wraps ValidationError + storage failures       │
//! │                                                                         │
//! │  Flow: ValidationError → DbError::Validation → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Input validation errors.
///
/// Every variant is produced without touching the database, so a caller
/// receiving one knows nothing was written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field was not supplied.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// A numeric field must be zero or greater.
    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    /// A real-valued field is NaN or infinite.
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    /// One entity of a batch failed validation.
    ///
    /// `index` is the zero-based position of the entity in the batch.
    #[error("item {index}: {source}")]
    InBatch {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },

    /// An update was requested without any field to change.
    #[error("no fields to update")]
    NothingToUpdate,

    /// A filtered update or delete was requested without any condition.
    #[error("filter has no conditions")]
    EmptyFilter,

    /// A filter contains an AND/OR group with no conditions.
    #[error("filter contains an empty AND/OR group")]
    EmptyGroup,

    /// A filter referenced a column outside the table's allow-list.
    #[error("unknown column '{column}' for table {table}")]
    UnknownColumn { table: &'static str, column: String },

    /// A raw filter predicate could not be parsed.
    #[error("invalid filter at offset {offset}: {reason}")]
    InvalidFilter { offset: usize, reason: String },

    /// The number of `?` placeholders differs from the parameters given.
    #[error("filter has {placeholders} placeholders but {params} parameters were given")]
    ParameterCount { placeholders: usize, params: usize },
}

impl ValidationError {
    /// Tags an error with the position of the batch entity that caused it.
    pub fn in_batch(self, index: usize) -> Self {
        ValidationError::InBatch {
            index,
            source: Box::new(self),
        }
    }

    /// Returns the batch position, if this error came from a batch.
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            ValidationError::InBatch { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ValidationError::Required { field: "phone" };
        assert_eq!(err.to_string(), "phone is required");

        let err = ValidationError::ParameterCount {
            placeholders: 2,
            params: 1,
        };
        assert_eq!(
            err.to_string(),
            "filter has 2 placeholders but 1 parameters were given"
        );
    }

    #[test]
    fn test_batch_error_carries_index() {
        let err = ValidationError::Required { field: "name" }.in_batch(3);
        assert_eq!(err.batch_index(), Some(3));
        assert_eq!(err.to_string(), "item 3: name is required");
        assert_eq!(ValidationError::NothingToUpdate.batch_index(), None);
    }
}
