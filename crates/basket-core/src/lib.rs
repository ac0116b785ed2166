//! # basket-core: Pure Ledger Logic for Basket POS
//!
//! This crate holds the deterministic half of the grocery transaction ledger:
//! pricing, the cart state machine and lot-selection planning. It performs no
//! I/O; persistence and the commit protocol live in `basket-db`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Basket POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                Register front end (out of scope)                │   │
//! │  │      Scan ──► Cart ──► Tender ──► Receipt                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ basket-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  money  │ │ pricing │ │  cart   │ │inventory│ │validation│ │   │
//! │  │   │ Money   │ │ price() │ │  Cart   │ │plan_fefo│ │  rules  │  │   │
//! │  │   │ Weight  │ │ totals  │ │ pending │ │case math│ │  ages   │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS • PURE FUNCTIONS       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  basket-db (Ledger / Storage)                   │   │
//! │  │     commit protocol, lot ledger, deli tokens, migrations        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, InventoryLot, Transaction, DeliOrder)
//! - [`money`] - Integer-cent Money and milli-unit Weight
//! - [`pricing`] - Cart pricing: discounts, tax, totals
//! - [`cart`] - Cart state machine with pending weight / age steps
//! - [`inventory`] - FEFO draw planning and case-break arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use basket_core::money::Money;
//! use basket_core::types::TaxRate;
//!
//! let taxable = Money::from_cents(1800);
//! let tax = taxable.calculate_tax(TaxRate::from_bps(800));
//! assert_eq!(tax.cents(), 144);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod inventory;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{
    Cart, CartItem, CartLineSource, CommitLine, CommitRequest, Pending, QuantityUpdate,
    RefundRequest, SaleRequest,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Weight};
pub use pricing::{price, CartTotals, PricedCart, PricedLine};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default sales tax: 8%.
pub const DEFAULT_TAX_RATE_BPS: u32 = 800;

/// Minimum age for age-restricted products.
pub const DEFAULT_MINIMUM_AGE: i64 = 18;

/// Products at or below this on-hand count (and above zero) are "low stock".
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Lots expiring within this many days show up on the expiration report.
pub const EXPIRATION_WINDOW_DAYS: i64 = 30;

/// Maximum distinct lines in a single cart.
///
/// ## Business Reason
/// Prevents runaway carts and keeps a single commit transaction short.
pub const MAX_CART_ITEMS: usize = 100;

/// Largest accepted scale reading, in milli-units (1000.000 of the unit).
///
/// ## Business Reason
/// A grocery scale never reads this high; anything above it is a bad entry.
pub const MAX_WEIGHT_MILLI: i64 = 1_000_000;

/// Largest accepted catalog price: $1,000,000.00.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Catches typing 1000 instead of 10 at the keypad.
pub const MAX_ITEM_QUANTITY: i64 = 999;
