//! # Error Types
//!
//! Domain-specific error types for hidrocolon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  hidrocolon-core errors (this file)                                 │
//! │  ├── CoreError        - Invariant violations, not-found, stock      │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  hidrocolon-db errors (separate crate)                              │
//! │  └── DbError          - Database operation failures                 │
//! │                        (carries CoreError through as Domain)        │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → DbError → caller               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (shift id, code, amounts)
//! 3. Each invariant violation has its own variant, so callers can
//!    distinguish "already open" from "already closed" from
//!    "authorization required" without parsing strings
//! 4. Financial operations never retry; rollback is the only recovery

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent invariant violations or domain failures. They abort the
/// surrounding transaction; no partial state is ever visible.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No shift exists with the given id.
    #[error("Shift not found: {0}")]
    ShiftNotFound(i64),

    /// A shift is already open; at most one may be open system-wide.
    ///
    /// ## When This Occurs
    /// - Opening a shift while another is open
    /// - Two concurrent open requests: exactly one succeeds, the loser
    ///   gets this error from the database-level uniqueness guarantee
    #[error("A shift is already open; close it before opening another")]
    ShiftAlreadyOpen,

    /// No shift is currently open.
    ///
    /// ## When This Occurs
    /// - Recording a sale, expense or drawer record with no open shift
    #[error("No shift is currently open")]
    NoOpenShift,

    /// The shift has already been closed; close happens exactly once.
    #[error("Shift {0} is already closed")]
    ShiftAlreadyClosed(i64),

    /// A variance left the tolerance band and no authorizer was supplied.
    ///
    /// ## Caller Recovery
    /// Re-invoke close with an authorizing user and a justification.
    /// Nothing was persisted.
    #[error(
        "Closing requires authorization: cash variance {cash_variance_centavos}, \
         voucher variance {voucher_variance_centavos}, \
         transfer variance {transfer_variance_centavos} (centavos)"
    )]
    AuthorizationRequired {
        cash_variance_centavos: i64,
        voucher_variance_centavos: i64,
        transfer_variance_centavos: i64,
    },

    /// The supplied authorizer cannot sign off on a close.
    ///
    /// ## When This Occurs
    /// - User does not exist, is inactive, or lacks the authorize grant
    #[error("User {user_id} cannot authorize a shift close")]
    NotAnAuthorizer { user_id: String },

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Voiding is a one-way, one-time transition.
    #[error("Sale {0} is already voided")]
    SaleAlreadyVoided(String),

    /// Medication not found in the catalog.
    #[error("Medication not found: {0}")]
    MedicationNotFound(String),

    /// Insufficient stock to complete a sale line.
    ///
    /// ## Transaction Interaction
    /// Raised mid-sale; the whole sale transaction rolls back, including
    /// lines whose stock was already decremented.
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// Tender rows do not decompose the sale total exactly.
    #[error(
        "Tenders sum to {tendered_centavos} but the sale totals {total_centavos} (centavos)"
    )]
    TenderMismatch {
        total_centavos: i64,
        tendered_centavos: i64,
    },

    /// User not found.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The user exists but has been deactivated.
    #[error("User {user_id} is inactive")]
    InactiveUser { user_id: String },

    /// Doctor not found.
    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    /// A commission payout was requested with nothing to pay.
    #[error("Doctor {doctor_id} has no unpaid commissions up to the cutoff")]
    NoUnpaidCommissions { doctor_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input does not meet requirements and are
/// rejected before any persistence runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            code: "AMOX-500".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for AMOX-500: available 3, requested 5"
        );

        let err = CoreError::ShiftAlreadyClosed(42);
        assert_eq!(err.to_string(), "Shift 42 is already closed");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "justification".to_string(),
        };
        assert_eq!(err.to_string(), "justification is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "amount".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
