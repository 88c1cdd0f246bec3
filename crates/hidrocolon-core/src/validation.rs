//! # Validation Module
//!
//! Input validation utilities for the Hidrocolon backend.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                              │
//! │                                                                     │
//! │  Layer 1: Type system (deserialization)                             │
//! │  ├── Closed denomination enums reject unknown keys                  │
//! │  └── Status enums reject unknown values                             │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 2: THIS MODULE - field and business rule validation          │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 3: Database (SQLite)                                         │
//! │  ├── NOT NULL / UNIQUE / FK constraints                             │
//! │  └── Partial unique index on the single open shift                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_JUSTIFICATION_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string id (users, doctors, sales, medications).
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Amount Validators
// =============================================================================

/// Validates a monetary amount that must be strictly positive
/// (expenses, drawer records, tender amounts).
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a sale line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed 999 (a fat-fingered 1000 is never a real clinic sale)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > 999 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: 999,
        });
    }

    Ok(())
}

// =============================================================================
// Text Validators
// =============================================================================

/// Validates a required description field (expenses).
pub fn validate_description(description: &str) -> ValidationResult<()> {
    let description = description.trim();

    if description.is_empty() {
        return Err(ValidationError::Required {
            field: "description".to_string(),
        });
    }

    if description.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 500,
        });
    }

    Ok(())
}

/// Validates the justification accompanying an authorized close.
///
/// ## Rules
/// - Required and non-blank (an out-of-tolerance close always says why)
/// - Bounded length
pub fn validate_justification(justification: &str) -> ValidationResult<()> {
    let justification = justification.trim();

    if justification.is_empty() {
        return Err(ValidationError::Required {
            field: "justification".to_string(),
        });
    }

    if justification.len() > MAX_JUSTIFICATION_LEN {
        return Err(ValidationError::TooLong {
            field: "justification".to_string(),
            max: MAX_JUSTIFICATION_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("user_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("user_id", "").is_err());
        assert!(validate_uuid("user_id", "not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_positive_amount() {
        assert!(validate_positive_amount("amount", Money::from_centavos(1)).is_ok());
        assert!(validate_positive_amount("amount", Money::zero()).is_err());
        assert!(validate_positive_amount("amount", Money::from_centavos(-100)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_description() {
        assert!(validate_description("Compra de papelería").is_ok());
        assert!(validate_description("   ").is_err());
        assert!(validate_description(&"x".repeat(501)).is_err());
    }

    #[test]
    fn test_validate_justification() {
        assert!(validate_justification("Billete falso retirado del cajón").is_ok());
        assert!(validate_justification("").is_err());
        assert!(validate_justification(&"x".repeat(MAX_JUSTIFICATION_LEN + 1)).is_err());
    }
}
