//! # Repository Module
//!
//! SQL for the ledger tables, one module per table family.
//!
//! ## Two Entry Points Per Repository
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Catalog reads / setup                Inside a ledger transaction      │
//! │  ─────────────────────                ──────────────────────────       │
//! │  db.products().get_by_barcode(..)     product::require(&mut tx, ..)    │
//! │  db.promotions().active_at(..)        product::decrement_stock(..)     │
//! │  db.lots().expiring_between(..)       lot::draw(&mut tx, ..)           │
//! │       │                                    │                            │
//! │       │ SqlitePool                         │ &mut SqliteConnection      │
//! │       ▼                                    ▼                            │
//! │  one statement, autocommit            part of one atomic commit        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Guarded updates (`… WHERE stock_quantity >= ?`) are how the "never below
//! zero" rules hold under concurrent writers: a guard that matches no row
//! becomes `InsufficientStock` or `DbError::Conflict`, never a negative count.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product lookup, stock counters
//! - [`promotion::PromotionRepository`] - Active promotions with product sets
//! - [`customer::CustomerRepository`] - Customers and loyalty points
//! - [`lot::LotRepository`] - Inventory lots and expiration report
//! - [`transaction::TransactionRepository`] - Committed transactions
//! - [`deli`] - Deli token rows

pub mod customer;
pub mod deli;
pub mod lot;
pub mod product;
pub mod promotion;
pub mod transaction;
