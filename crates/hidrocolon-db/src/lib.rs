//! # hidrocolon-db: Database Layer for the Hidrocolon Backend
//!
//! This crate provides persistence for the shift-reconciliation core.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Hidrocolon Data Flow                            │
//! │                                                                     │
//! │  Request handler (web layer, elsewhere)                             │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │                 hidrocolon-db (THIS CRATE)                  │   │
//! │  │                                                             │   │
//! │  │   ┌────────────┐   ┌──────────────┐   ┌──────────────┐     │   │
//! │  │   │  Database  │   │ Repositories │   │  Migrations  │     │   │
//! │  │   │  (pool.rs) │◄──│ shift, sale, │   │  (embedded)  │     │   │
//! │  │   │ SqlitePool │   │ drawer, ...  │   │ 001_init.sql │     │   │
//! │  │   └────────────┘   └──────────────┘   └──────────────┘     │   │
//! │  │                                                             │   │
//! │  │   All coordination happens through the store's              │   │
//! │  │   transactions; no in-memory shared state                   │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite database file (WAL mode)                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hidrocolon_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("clinic.db")).await?;
//!
//! let shift = db.shifts().open(&operator_id, opening).await?;
//! // ... sales, expenses, payouts accumulate ...
//! let closed = db.shifts().close(close_request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::commission::CommissionRepository;
pub use repository::drawer::DrawerRepository;
pub use repository::medication::MedicationRepository;
pub use repository::sale::{CreateSaleRequest, SaleLineRequest, SaleRepository, TenderRequest};
pub use repository::shift::{CloseShiftRequest, ShiftFilter, ShiftRepository, ShiftSummary};
pub use repository::user::UserRepository;
