//! # Validation Module
//!
//! Field rules shared by inserts and update patches.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (Rust, before any storage access)                │
//! │  ├── Required fields present (empty strings are values)                │
//! │  ├── price >= 0, reals finite                                          │
//! │  └── Batch position attached on failure                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints (phone, email)                                 │
//! │  └── Foreign key constraints (seller, buyer, product)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mercado_core::validation::{require, require_text};
//!
//! assert_eq!(require_text("name", Some("Lamp")).unwrap(), "Lamp");
//! assert_eq!(require_text("name", Some("")).unwrap(), "");
//! assert!(require_text::<&str>("name", None).is_err());
//! assert!(require::<i64>("quantity", None).is_err());
//! ```

use crate::error::{ValidationError, ValidationResult};

// =============================================================================
// Presence
// =============================================================================

/// Requires a value to be present.
pub fn require<T>(field: &'static str, value: Option<T>) -> ValidationResult<T> {
    value.ok_or(ValidationError::Required { field })
}

/// Requires a string to be present.
///
/// Only `None` is missing. An empty or whitespace-only string is a value
/// and is returned as given (not trimmed).
pub fn require_text<S: AsRef<str>>(field: &'static str, value: Option<S>) -> ValidationResult<String> {
    require(field, value).map(|s| s.as_ref().to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Requires a real to be present and finite.
pub fn require_finite(field: &'static str, value: Option<f64>) -> ValidationResult<f64> {
    let value = require(field, value)?;
    check_finite(field, value)
}

/// Rejects NaN and infinities.
pub fn check_finite(field: &'static str, value: f64) -> ValidationResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NotFinite { field })
    }
}

/// Validates a price: finite and zero or greater.
///
/// ## Example
/// ```rust
/// use mercado_core::validation::check_price;
///
/// assert!(check_price(9.99).is_ok());
/// assert!(check_price(0.0).is_ok());   // Free item
/// assert!(check_price(-1.0).is_err());
/// ```
pub fn check_price(value: f64) -> ValidationResult<f64> {
    let value = check_finite("price", value)?;
    if value < 0.0 {
        return Err(ValidationError::Negative { field: "price" });
    }
    Ok(value)
}

// =============================================================================
// Batch Validation
// =============================================================================

/// Validates every item of a batch in order, stopping at the first failure.
///
/// The error is tagged with the failing item's zero-based position.
pub fn validate_batch<T, R, F>(items: &[T], mut validate: F) -> ValidationResult<Vec<R>>
where
    F: FnMut(&T) -> ValidationResult<R>,
{
    items
        .iter()
        .enumerate()
        .map(|(index, item)| validate(item).map_err(|e| e.in_batch(index)))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("name", Some("Ana")).unwrap(), "Ana");
        assert_eq!(require_text("name", Some("")).unwrap(), "");
        assert_eq!(require_text("name", Some("  ")).unwrap(), "  ");
        assert_eq!(
            require_text::<&str>("phone", None),
            Err(ValidationError::Required { field: "phone" })
        );
    }

    #[test]
    fn test_require_finite() {
        assert_eq!(require_finite("latitude", Some(41.0)).unwrap(), 41.0);
        assert!(require_finite("latitude", Some(f64::NAN)).is_err());
        assert!(require_finite("latitude", None).is_err());
    }

    #[test]
    fn test_check_price() {
        assert!(check_price(0.0).is_ok());
        assert!(check_price(19.98).is_ok());
        assert_eq!(
            check_price(-0.01),
            Err(ValidationError::Negative { field: "price" })
        );
        assert!(check_price(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_batch_stops_at_first_failure() {
        let items = [Some(1), Some(2), None, None];
        let mut seen = 0;
        let err = validate_batch(&items, |item| {
            seen += 1;
            require("n", *item)
        })
        .unwrap_err();

        assert_eq!(err.batch_index(), Some(2));
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_validate_batch_all_valid() {
        let items = [Some(1), Some(2)];
        let out = validate_batch(&items, |item| require("n", *item)).unwrap();
        assert_eq!(out, vec![1, 2]);
    }
}
