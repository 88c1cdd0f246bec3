//! # Repository Module
//!
//! Database repository implementations for the Hidrocolon backend.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  Repository Pattern Explained                       │
//! │                                                                     │
//! │  The Repository pattern abstracts database access behind a clean    │
//! │  API; SQL lives here and nowhere else.                              │
//! │                                                                     │
//! │  Caller                                                             │
//! │       │  db.shifts().close(request)                                 │
//! │       ▼                                                             │
//! │  ShiftRepository                                                    │
//! │  ├── open(&self, operator_id, opening)                              │
//! │  ├── close(&self, request)                                          │
//! │  ├── get_active(&self)                                              │
//! │  ├── summary(&self, shift_id)                                       │
//! │  └── list(&self, filter)                                            │
//! │       │  SQL inside one transaction                                 │
//! │       ▼                                                             │
//! │  SQLite Database                                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`shift::ShiftRepository`] - Shift lifecycle, aggregation, close
//! - [`sale::SaleRepository`] - Sale creation and audited void
//! - [`medication::MedicationRepository`] - Catalog slice with guarded stock
//! - [`drawer::DrawerRepository`] - Expenses, vouchers, transfers, deposits
//! - [`commission::CommissionRepository`] - Doctor commission payouts
//! - [`user::UserRepository`] - Operator and authorizer lookups

pub mod commission;
pub mod drawer;
pub mod medication;
pub mod sale;
pub mod shift;
pub mod user;
