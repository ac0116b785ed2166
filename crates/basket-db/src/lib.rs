//! # basket-db: Ledger Storage for Basket POS
//!
//! SQLite persistence and the transaction commit protocol. Everything that
//! changes authoritative state (transactions, stock counters, lots, loyalty
//! points, deli tokens) goes through this crate, inside one database
//! transaction per operation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Basket POS Data Flow                             │
//! │                                                                         │
//! │  Register: Cart (basket-core) ──► to_commit_request()                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    basket-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────┐  │   │
//! │  │   │  Ledger  │   │ Inventory │   │   Deli    │   │  Repos   │  │   │
//! │  │   │ sale     │   │ receive   │   │ issue     │   │ product  │  │   │
//! │  │   │ refund   │   │ case break│   │ resolve   │   │ lot, ... │  │   │
//! │  │   └────┬─────┘   └─────┬─────┘   └─────┬─────┘   └────┬─────┘  │   │
//! │  │        └───────────────┴── with_retry ─┴──────────────┘        │   │
//! │  │                              │                                  │   │
//! │  │                     Database (pool.rs)                          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                ▼                                        │
//! │               SQLite (WAL) ~/.config/basket-pos/basket.db               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and service accessors
//! - [`config`] - `basket.toml` + environment configuration
//! - [`ledger`] - Sale/refund commit protocol, return lookup
//! - [`inventory`] - Stock receipt, case breaks, stock reports
//! - [`deli`] - Deli token issue and resolution
//! - [`repository`] - Per-table SQL
//! - [`retry`] - Bounded retry of conflicting writes
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - Database error types and stable error codes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use basket_db::{Database, LedgerConfig};
//!
//! let config = LedgerConfig::load(None)?;
//! let db = Database::open(&config).await?;
//!
//! let cart = db.ledger().start_cart(Utc::now()).await?;
//! // ... scan, weigh, verify ...
//! let request = cart.to_commit_request(TenderType::Cash, Some(2000), None)?;
//! let receipt = db.ledger().commit(&request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod deli;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{LedgerConfig, LedgerSettings};
pub use deli::DeliTokenIssuer;
pub use error::{DbError, DbResult, ErrorCode, ErrorReport};
pub use inventory::{CaseBreak, InventoryManager};
pub use ledger::Ledger;
pub use pool::{Database, DbConfig};
pub use retry::RetryPolicy;

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::lot::{ExpiringLot, LotRepository};
pub use repository::product::ProductRepository;
pub use repository::promotion::PromotionRepository;
pub use repository::transaction::TransactionRepository;
