//! # Domain Types
//!
//! Core domain types used throughout Basket POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  InventoryLot   │   │   Promotion     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  price_cents    │◄──│  product_id     │   │  discount_bps   │       │
//! │  │  stock_quantity │   │  qty_remaining  │   │  start / end    │       │
//! │  │  case linkage   │   │  expiration     │   │  product_ids    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  Transaction    │   │ TransactionItem │   │   DeliOrder     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  total (signed) │──►│  frozen snapshot│   │  single-use     │       │
//! │  │  refunded_by_id │   │  of the line    │   │  is_fulfilled   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! - A `Transaction` exclusively owns its `TransactionItem`s
//! - An `InventoryLot` belongs to exactly one `Product`
//! - Only basket-db mutates `Product.stock_quantity` and lots

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Weight};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 800 bps = 8%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (config input only).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::from_bps(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product as seen by the ledger.
///
/// ## Case / Each
/// A product is a *case* iff both `contains_product_id` and `case_unit_count`
/// are set and `case_unit_count > 0`. Use [`Product::case_link`] rather than
/// reading the two fields directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,

    /// Unit price in cents. For weighed products this is the price per unit
    /// of weight (e.g. per lb).
    pub price_cents: i64,

    /// Unit cost in cents (snapshotted onto transaction items).
    pub cost_cents: Option<i64>,

    /// Authoritative on-hand counter used for admission checks.
    pub stock_quantity: i64,

    /// Sold by weight at the scale.
    pub is_weighed: bool,

    /// Selling unit label ("each", "lb", "kg").
    pub unit: String,

    /// Requires age verification before it enters a cart.
    pub is_age_restricted: bool,

    /// The "each" product this case contains.
    pub contains_product_id: Option<String>,

    /// How many eaches one case holds.
    pub case_unit_count: Option<i64>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Case → each linkage of a case product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseLink {
    pub each_product_id: String,
    pub units_per_case: i64,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the case linkage if this product is a configured case.
    pub fn case_link(&self) -> Option<CaseLink> {
        match (&self.contains_product_id, self.case_unit_count) {
            (Some(each), Some(count)) if count > 0 => Some(CaseLink {
                each_product_id: each.clone(),
                units_per_case: count,
            }),
            _ => None,
        }
    }

    #[inline]
    pub fn is_case(&self) -> bool {
        self.case_link().is_some()
    }
}

// =============================================================================
// Inventory Lot
// =============================================================================

/// A dated batch of received stock for one product.
///
/// ## Invariant
/// `0 <= quantity_remaining <= quantity_received`. `quantity_received` never
/// changes after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventoryLot {
    pub id: String,
    pub product_id: String,
    pub quantity_received: i64,
    pub quantity_remaining: i64,
    #[ts(as = "Option<String>")]
    pub expiration_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
}

// =============================================================================
// Promotion
// =============================================================================

/// A percentage-off promotion over a set of products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Promotion {
    pub id: String,
    pub description: String,

    /// Discount in basis points (1000 = 10% off).
    pub discount_bps: u32,

    #[ts(as = "String")]
    pub start_date: DateTime<Utc>,

    /// Open-ended when `None`.
    #[ts(as = "Option<String>")]
    pub end_date: Option<DateTime<Utc>>,

    pub is_active: bool,

    /// Products the promotion applies to.
    pub product_ids: Vec<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    /// Active iff enabled and `start_date <= at <= end_date (or ∞)`.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= at && self.end_date.map_or(true, |end| at <= end)
    }

    pub fn applies_to(&self, product_id: &str) -> bool {
        self.product_ids.iter().any(|id| id == product_id)
    }
}

/// Keeps only promotions active at `at`, preserving iteration order.
pub fn active_promotions(promotions: &[Promotion], at: DateTime<Utc>) -> Vec<Promotion> {
    promotions
        .iter()
        .filter(|p| p.is_active_at(at))
        .cloned()
        .collect()
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Tender Type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TenderType {
    /// Physical cash; change is computed.
    Cash,
    /// Card on an external terminal.
    Card,
}

// =============================================================================
// Pricing Mode
// =============================================================================

/// Whether a cart is ringing up a sale or assembling a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PricingMode {
    #[default]
    Sale,
    Return,
}

// =============================================================================
// Transaction
// =============================================================================

/// A committed sale or refund.
///
/// `total_cents < 0` marks a refund. `refunded_by_id` is set at most once,
/// when a refund of this transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub tender_type: TenderType,
    pub amount_tendered_cents: Option<i64>,
    pub change_given_cents: i64,
    pub customer_id: Option<String>,

    /// The refund that reversed this transaction.
    pub refunded_by_id: Option<String>,

    /// For refunds: the transaction being reversed.
    pub refund_of_id: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// Line snapshots in cart order.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<TransactionItem>,
}

impl Transaction {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn is_refund(&self) -> bool {
        self.total_cents < 0
    }
}

/// Immutable snapshot of a cart line captured at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TransactionItem {
    pub id: String,
    pub transaction_id: String,
    /// Position in the cart (0-based).
    pub position: i64,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub cost_cents: Option<i64>,
    /// Signed: negative on refunds.
    pub quantity: i64,
    pub weight_milli: Option<i64>,
    pub discount_cents: i64,
    pub line_total_cents: i64,
    /// Set when the line came from a deli token.
    pub deli_order_id: Option<String>,
}

impl TransactionItem {
    pub fn weight(&self) -> Option<Weight> {
        self.weight_milli.map(Weight::from_milli)
    }

    /// Whether this line moved aggregate stock when it committed.
    pub fn affects_stock(&self) -> bool {
        self.weight_milli.is_none() && self.deli_order_id.is_none()
    }
}

// =============================================================================
// Deli Order
// =============================================================================

/// A single-use, pre-weighed and pre-priced token (the printed scale sticker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeliOrder {
    pub id: String,
    pub base_product_id: String,
    pub weight_milli: i64,
    pub total_price_cents: i64,
    /// One-way flag: false until the token is consumed.
    pub is_fulfilled: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl DeliOrder {
    pub fn weight(&self) -> Weight {
        Weight::from_milli(self.weight_milli)
    }

    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
