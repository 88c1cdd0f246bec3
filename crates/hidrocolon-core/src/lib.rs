//! # hidrocolon-core: Pure Business Logic for the Hidrocolon Backend
//!
//! This crate is the **heart** of the clinic's cash-register backend. It
//! contains the shift reconciliation logic as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Hidrocolon Architecture                          │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │                Web layer (elsewhere)                        │   │
//! │  │   open shift ─► record sales ─► dashboard ─► close shift    │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │            ★ hidrocolon-core (THIS CRATE) ★                 │   │
//! │  │                                                             │   │
//! │  │  ┌────────┐ ┌──────────────┐ ┌─────────────┐ ┌──────────┐  │   │
//! │  │  │ money  │ │ denomination │ │ withholding │ │reconcilia│  │   │
//! │  │  │ Money  │ │ Bill, Coin   │ │ SalesTotals │ │  -tion   │  │   │
//! │  │  │ Rate   │ │CashBreakdown │ │ Withholdings│ │ figures  │  │   │
//! │  │  └────────┘ └──────────────┘ └─────────────┘ └──────────┘  │   │
//! │  │                                                             │   │
//! │  │  NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS           │   │
//! │  └────────────────────────────┬────────────────────────────────┘   │
//! │                               │                                     │
//! │  ┌────────────────────────────▼────────────────────────────────┐   │
//! │  │              hidrocolon-db (Database Layer)                 │   │
//! │  │      SQLite repositories, transactions, migrations          │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Shift, Sale, tenders, drawer records)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`denomination`] - Closed bill/coin set and the drawer calculator
//! - [`withholding`] - Tax and card-commission withholding per method
//! - [`reconciliation`] - The shift-close computation
//! - [`error`] - Domain error types
//! - [`validation`] - Field and business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every function is deterministic
//! 2. **No I/O**: database, network and clock access are FORBIDDEN here
//! 3. **Integer Money**: all monetary values are centavos (i64)
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod denomination;
pub mod error;
pub mod money;
pub mod reconciliation;
pub mod types;
pub mod validation;
pub mod withholding;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use hidrocolon_core::Money` instead of
// `use hidrocolon_core::money::Money`

pub use denomination::{Bill, CashBreakdown, Coin};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use reconciliation::{CloseInput, Reconciliation};
pub use types::*;
pub use withholding::{SalesTotals, Withholdings};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Statutory withholding rate applied to every sales bucket: 16%.
pub const TAX_RATE: types::Rate = types::Rate::from_bps(1600);

/// Contractual bank commission on card settlements: 6%, deducted before
/// the statutory rate applies to the remainder.
pub const CARD_COMMISSION_RATE: types::Rate = types::Rate::from_bps(600);

/// Variance tolerance band on shift close: Q0.50.
///
/// ## Business Reason
/// Sub-unit drift from rounding and coin handling closes without
/// sign-off. Exactly Q0.50 still passes; Q0.51 requires an authorizer.
pub const VARIANCE_TOLERANCE: Money = Money::from_centavos(50);

/// Maximum length of a close justification.
pub const MAX_JUSTIFICATION_LEN: usize = 500;
