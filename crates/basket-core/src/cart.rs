//! # Cart State Machine
//!
//! The session-scoped cart a cashier assembles before tendering.
//!
//! `Cart` is a value: every transition borrows the current cart and returns a
//! new one (or an error, leaving the caller's cart untouched). Totals are
//! recomputed through [`crate::pricing::price`] after every transition, so a
//! cart never carries stale figures.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   SALE ──────────── set_mode(Return) / load_return_items ──► RETURN     │
//! │    ▲  │                                                        │        │
//! │    │  │ add_item(age restricted, catalog or deli token)        │        │
//! │    │  ▼                                                        │        │
//! │    │ AWAITING AGE ── confirm_age ──┐                           │        │
//! │    │                               ▼                           │        │
//! │    │ add_item(weighed) ──► AWAITING WEIGHT ── confirm_weight   │        │
//! │    │                                                           │        │
//! │    └──────────────────── clear() ◄─────────────────────────────┘        │
//! │                                                                         │
//! │   While a selection is pending, add_item is refused until it is        │
//! │   confirmed or cancel_pending() drops it.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Admission
//! A catalog line may only grow while its quantity stays within the product's
//! on-hand `stock_quantity`. Deli-token lines are already weighed and priced,
//! so they bypass both the weight step and the stock ceiling. The age gate
//! applies to both: it looks at the base product, whatever the scan was.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Weight;
use crate::pricing::{price, CartTotals};
use crate::types::{
    DeliOrder, PricingMode, Product, Promotion, TaxRate, TenderType, TransactionItem,
};
use crate::validation::{age_on, validate_cart_size, validate_quantity, validate_weight};
use crate::DEFAULT_MINIMUM_AGE;

// =============================================================================
// Cart Line Source
// =============================================================================

/// What a scan resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartLineSource {
    /// A catalog product, subject to the age, weight and stock gates.
    Catalog(Product),

    /// A fulfilled deli token: a single pre-priced line for its base product.
    DeliToken { order: DeliOrder, product: Product },
}

impl CartLineSource {
    /// The catalog product behind the scan.
    pub fn product(&self) -> &Product {
        match self {
            CartLineSource::Catalog(product) => product,
            CartLineSource::DeliToken { product, .. } => product,
        }
    }
}

// =============================================================================
// Cart Item
// =============================================================================

/// One line in the cart.
///
/// Product fields are a snapshot taken when the line was added; later catalog
/// edits do not reach a cart in progress.
///
/// ## Quantity vs Weight
/// - Unit lines: `quantity` is the signed count, `weight_milli` is `None`
/// - Weighed lines: `quantity` is `±1`, `weight_milli` is the magnitude
/// - Deli lines: `quantity` is `±1`, priced at the token's total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub cost_cents: Option<i64>,
    pub is_age_restricted: bool,

    /// On-hand count when the line was added (admission ceiling).
    pub stock_quantity: i64,

    pub quantity: i64,
    pub weight_milli: Option<i64>,
    pub deli_order_id: Option<String>,

    /// Derived by the pricing engine; not authoritative until commit.
    pub discount_cents: i64,
}

impl CartItem {
    /// A unit line for a catalog product.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            cost_cents: product.cost_cents,
            is_age_restricted: product.is_age_restricted,
            stock_quantity: product.stock_quantity,
            quantity,
            weight_milli: None,
            deli_order_id: None,
            discount_cents: 0,
        }
    }

    /// A weighed line: quantity 1, priced per unit of weight.
    pub fn from_weighed(product: &Product, weight: Weight) -> Self {
        CartItem {
            weight_milli: Some(weight.milli()),
            ..CartItem::from_product(product, 1)
        }
    }

    /// A pre-priced deli line. Not a weighed line: the price is the token's
    /// total and no second weight entry is needed.
    pub fn from_deli_order(order: &DeliOrder, product: &Product) -> Self {
        CartItem {
            unit_price_cents: order.total_price_cents,
            deli_order_id: Some(order.id.clone()),
            ..CartItem::from_product(product, 1)
        }
    }

    /// A negated return line built from a committed line snapshot.
    pub fn from_return_snapshot(item: &TransactionItem) -> Self {
        let quantity = match item.weight_milli {
            Some(_) => -1,
            None => -item.quantity.abs(),
        };
        CartItem {
            product_id: item.product_id.clone(),
            sku: item.sku.clone(),
            name: item.name.clone(),
            unit_price_cents: item.price_cents,
            cost_cents: item.cost_cents,
            is_age_restricted: false,
            stock_quantity: 0,
            quantity,
            weight_milli: item.weight_milli,
            deli_order_id: item.deli_order_id.clone(),
            discount_cents: 0,
        }
    }

    #[inline]
    pub fn weight(&self) -> Option<Weight> {
        self.weight_milli.map(Weight::from_milli)
    }

    #[inline]
    pub fn is_weighed(&self) -> bool {
        self.weight_milli.is_some()
    }

    /// A plain unit line that counts against stock.
    #[inline]
    pub fn is_unit_line(&self) -> bool {
        self.weight_milli.is_none() && self.deli_order_id.is_none()
    }

    pub fn to_commit_line(&self) -> CommitLine {
        CommitLine {
            product_id: self.product_id.clone(),
            quantity: self.quantity,
            weight_milli: self.weight_milli,
            deli_order_id: self.deli_order_id.clone(),
        }
    }
}

// =============================================================================
// Pending Selection
// =============================================================================

/// A scan selected but not yet admitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "selection", rename_all = "snake_case")]
pub enum Pending {
    #[default]
    None,
    AwaitingWeight(Product),
    /// Held whole so a deli token is admitted as a token once verified.
    AwaitingAgeVerification(CartLineSource),
}

/// Outcome of [`Cart::update_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuantityUpdate {
    Set { quantity: i64 },
    /// The request exceeded on-hand stock and was lowered to it.
    Clamped { requested: i64, ceiling: i64 },
    Removed,
}

// =============================================================================
// Commit Request
// =============================================================================

/// A cart line as submitted to the ledger. Prices are not trusted from the
/// client; the ledger re-prices every line itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommitLine {
    pub product_id: String,
    pub quantity: i64,
    pub weight_milli: Option<i64>,
    pub deli_order_id: Option<String>,
}

/// Everything the ledger needs to commit a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleRequest {
    pub lines: Vec<CommitLine>,
    pub tender_type: TenderType,
    pub amount_tendered_cents: Option<i64>,
    pub customer_id: Option<String>,
    /// Totals the register displayed; checked against the ledger's re-pricing.
    pub quoted: Option<CartTotals>,
}

/// Everything the ledger needs to commit a refund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RefundRequest {
    pub lines: Vec<CommitLine>,
    pub tender_type: TenderType,
    pub original_transaction_id: String,
    pub quoted: Option<CartTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommitRequest {
    Sale(SaleRequest),
    Refund(RefundRequest),
}

// =============================================================================
// Cart
// =============================================================================

/// The cart aggregate.
///
/// ## Invariants
/// - At most one unit line per product (re-adding increments it)
/// - Weighed and deli lines are always separate lines
/// - `totals` always equals `price(items, promotions, mode, tax_rate)`
/// - Return mode only holds lines loaded from a committed sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartItem>,
    mode: PricingMode,
    pending: Pending,
    promotions: Vec<Promotion>,
    tax_rate: TaxRate,
    minimum_age: i64,
    returning_transaction_id: Option<String>,
    totals: CartTotals,
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new(TaxRate::default(), Vec::new())
    }
}

impl Cart {
    /// Creates an empty sale-mode cart priced with `tax_rate` and the
    /// currently active `promotions`.
    pub fn new(tax_rate: TaxRate, promotions: Vec<Promotion>) -> Self {
        Cart {
            items: Vec::new(),
            mode: PricingMode::Sale,
            pending: Pending::None,
            promotions,
            tax_rate,
            minimum_age: DEFAULT_MINIMUM_AGE,
            returning_transaction_id: None,
            totals: CartTotals::default(),
        }
    }

    /// Sets the age an age-restricted product requires (default 18).
    pub fn with_minimum_age(mut self, minimum_age: i64) -> Self {
        self.minimum_age = minimum_age;
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn mode(&self) -> PricingMode {
        self.mode
    }

    pub fn pending(&self) -> &Pending {
        &self.pending
    }

    pub fn totals(&self) -> CartTotals {
        self.totals
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn minimum_age(&self) -> i64 {
        self.minimum_age
    }

    pub fn returning_transaction_id(&self) -> Option<&str> {
        self.returning_transaction_id.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Quantity of the unit line for `product_id` (0 when absent).
    pub fn quantity_of(&self, product_id: &str) -> i64 {
        self.unit_line(product_id).map_or(0, |i| self.items[i].quantity)
    }

    fn unit_line(&self, product_id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.product_id == product_id && item.is_unit_line())
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Admits a scanned line.
    ///
    /// - Return mode: rejected
    /// - Pending selection: rejected
    /// - Age restricted (catalog or deli token): moves to awaiting age
    ///   verification
    /// - Weighed (not a deli token): moves to awaiting weight
    /// - Otherwise: stock ceiling check, then increment or insert
    pub fn add_item(&self, source: CartLineSource) -> CoreResult<Cart> {
        self.check_accepts_scan()?;

        if source.product().is_age_restricted {
            let mut next = self.clone();
            next.pending = Pending::AwaitingAgeVerification(source);
            return Ok(next);
        }
        self.admit_source(source)
    }

    /// Fails if [`Cart::add_item`] would refuse any scan right now.
    ///
    /// Lets a caller check before consuming a single-use deli token.
    pub fn check_accepts_scan(&self) -> CoreResult<()> {
        if self.mode == PricingMode::Return {
            return Err(CoreError::cart("items cannot be added in return mode"));
        }
        if self.pending != Pending::None {
            return Err(CoreError::cart("a selection is awaiting confirmation"));
        }
        Ok(())
    }

    fn admit_source(&self, source: CartLineSource) -> CoreResult<Cart> {
        match source {
            CartLineSource::Catalog(product) => self.admit(product),
            CartLineSource::DeliToken { order, product } => {
                validate_cart_size(self.items.len())?;
                let mut next = self.clone();
                next.items.push(CartItem::from_deli_order(&order, &product));
                Ok(next.repriced())
            }
        }
    }

    /// Weight gate, then stock ceiling, then insert/increment.
    fn admit(&self, product: Product) -> CoreResult<Cart> {
        if product.is_weighed {
            let mut next = self.clone();
            next.pending = Pending::AwaitingWeight(product);
            return Ok(next);
        }

        let current = self.quantity_of(&product.id);
        if current >= product.stock_quantity {
            return Err(CoreError::StockCeiling {
                sku: product.sku.clone(),
                available: product.stock_quantity,
                requested: current + 1,
            });
        }
        validate_quantity(current + 1)?;

        let mut next = self.clone();
        next.pending = Pending::None;
        match next.unit_line(&product.id) {
            Some(index) => {
                let line = &mut next.items[index];
                line.quantity += 1;
                line.stock_quantity = product.stock_quantity;
            }
            None => {
                validate_cart_size(next.items.len())?;
                next.items.push(CartItem::from_product(&product, 1));
            }
        }
        Ok(next.repriced())
    }

    /// Completes an awaiting-weight selection with a scale reading.
    pub fn confirm_weight(&self, weight: Weight) -> CoreResult<Cart> {
        let Pending::AwaitingWeight(product) = &self.pending else {
            return Err(CoreError::cart("no product is awaiting a weight"));
        };
        validate_weight(weight)?;
        product.price().checked_multiply_weight(weight)?;
        validate_cart_size(self.items.len())?;

        let mut next = self.clone();
        next.items.push(CartItem::from_weighed(product, weight));
        next.pending = Pending::None;
        Ok(next.repriced())
    }

    /// Completes an awaiting-age selection against the cart's minimum age.
    ///
    /// On success the deferred admission runs as in [`Cart::add_item`], so a
    /// weighed age-restricted product moves on to awaiting weight and a deli
    /// token becomes its pre-priced line.
    pub fn confirm_age(&self, birth_date: NaiveDate, as_of: NaiveDate) -> CoreResult<Cart> {
        let Pending::AwaitingAgeVerification(source) = &self.pending else {
            return Err(CoreError::cart("no product is awaiting age verification"));
        };

        let age = age_on(birth_date, as_of)?;
        if age < self.minimum_age {
            return Err(CoreError::AgeVerification {
                age,
                minimum: self.minimum_age,
            });
        }

        let mut cleared = self.clone();
        cleared.pending = Pending::None;
        cleared.admit_source(source.clone())
    }

    /// Abandons an awaiting-weight or awaiting-age selection.
    pub fn cancel_pending(&self) -> Cart {
        let mut next = self.clone();
        next.pending = Pending::None;
        next
    }

    /// Sets the quantity of a unit line.
    ///
    /// Above on-hand stock the quantity is clamped and reported; below one
    /// the line is removed.
    pub fn update_quantity(
        &self,
        product_id: &str,
        new_quantity: i64,
    ) -> CoreResult<(Cart, QuantityUpdate)> {
        if self.mode == PricingMode::Return {
            return Err(CoreError::cart("quantities are fixed in return mode"));
        }

        let Some(index) = self.unit_line(product_id) else {
            if self.items.iter().any(|i| i.product_id == product_id) {
                return Err(CoreError::cart("weighed lines have no editable quantity"));
            }
            return Err(CoreError::not_found("Cart line", product_id));
        };

        if new_quantity < 1 {
            return Ok((self.remove_item(product_id), QuantityUpdate::Removed));
        }

        let ceiling = self.items[index].stock_quantity;
        let (applied, outcome) = if new_quantity > ceiling {
            (
                ceiling,
                QuantityUpdate::Clamped {
                    requested: new_quantity,
                    ceiling,
                },
            )
        } else {
            (new_quantity, QuantityUpdate::Set { quantity: new_quantity })
        };

        if applied < 1 {
            return Ok((self.remove_item(product_id), outcome));
        }
        validate_quantity(applied)?;

        let mut next = self.clone();
        next.items[index].quantity = applied;
        Ok((next.repriced(), outcome))
    }

    /// Drops every line for `product_id`.
    pub fn remove_item(&self, product_id: &str) -> Cart {
        let mut next = self.clone();
        next.items.retain(|item| item.product_id != product_id);
        next.repriced()
    }

    /// Replaces the cart with negated lines from a committed sale.
    pub fn load_return_items(&self, items: Vec<CartItem>, transaction_id: &str) -> Cart {
        let mut next = self.clone();
        next.items = items;
        next.mode = PricingMode::Return;
        next.pending = Pending::None;
        next.returning_transaction_id = Some(transaction_id.to_string());
        next.repriced()
    }

    /// Empties the cart and switches to `mode`.
    pub fn set_mode(&self, mode: PricingMode) -> Cart {
        let mut next = self.clear();
        next.mode = mode;
        next
    }

    /// Empties the cart and resets to sale mode.
    pub fn clear(&self) -> Cart {
        Cart::new(self.tax_rate, self.promotions.clone()).with_minimum_age(self.minimum_age)
    }

    fn repriced(mut self) -> Cart {
        let priced = price(&self.items, &self.promotions, self.mode, self.tax_rate);
        for (item, line) in self.items.iter_mut().zip(&priced.lines) {
            item.discount_cents = line.discount_cents;
        }
        self.totals = priced.totals;
        self
    }

    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------

    /// Packages the cart for the ledger.
    ///
    /// Sale carts become a [`SaleRequest`]; return carts become a
    /// [`RefundRequest`] against the transaction they were loaded from.
    pub fn to_commit_request(
        &self,
        tender_type: TenderType,
        amount_tendered_cents: Option<i64>,
        customer_id: Option<String>,
    ) -> CoreResult<CommitRequest> {
        if self.items.is_empty() {
            return Err(CoreError::cart("cart is empty"));
        }
        if self.pending != Pending::None {
            return Err(CoreError::cart("a selection is awaiting confirmation"));
        }

        let lines = self.items.iter().map(CartItem::to_commit_line).collect();
        let quoted = Some(self.totals);

        match self.mode {
            PricingMode::Sale => Ok(CommitRequest::Sale(SaleRequest {
                lines,
                tender_type,
                amount_tendered_cents,
                customer_id,
                quoted,
            })),
            PricingMode::Return => {
                let Some(original) = self.returning_transaction_id.clone() else {
                    return Err(CoreError::cart("return cart has no originating transaction"));
                };
                Ok(CommitRequest::Refund(RefundRequest {
                    lines,
                    tender_type,
                    original_transaction_id: original,
                    quoted,
                }))
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn product(id: &str, price_cents: i64, stock: i64) -> Product {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Product {
            id: id.to_string(),
            sku: id.to_uppercase(),
            barcode: None,
            name: format!("Product {id}"),
            price_cents,
            cost_cents: Some(price_cents / 2),
            stock_quantity: stock,
            is_weighed: false,
            unit: "each".to_string(),
            is_age_restricted: false,
            contains_product_id: None,
            case_unit_count: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn weighed(id: &str, price_cents: i64) -> Product {
        Product {
            is_weighed: true,
            unit: "lb".to_string(),
            ..product(id, price_cents, 0)
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn deli_order(id: &str, base_product_id: &str, total_price_cents: i64) -> DeliOrder {
        DeliOrder {
            id: id.to_string(),
            base_product_id: base_product_id.to_string(),
            weight_milli: 1250,
            total_price_cents,
            is_fulfilled: true,
            created_at: Utc::now(),
            fulfilled_at: Some(Utc::now()),
        }
    }

    fn add(cart: &Cart, product: &Product) -> CoreResult<Cart> {
        cart.add_item(CartLineSource::Catalog(product.clone()))
    }

    #[test]
    fn test_add_same_product_increments_line() {
        let soda = product("soda", 199, 5);
        let cart = add(&Cart::default(), &soda).unwrap();
        let cart = add(&cart, &soda).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.quantity_of("soda"), 2);
        assert_eq!(cart.totals().subtotal_cents, 398);
    }

    #[test]
    fn test_second_add_of_last_unit_hits_stock_ceiling() {
        let soda = product("soda", 199, 1);
        let cart = add(&Cart::default(), &soda).unwrap();

        let err = add(&cart, &soda).unwrap_err();

        assert_eq!(
            err,
            CoreError::StockCeiling {
                sku: "SODA".to_string(),
                available: 1,
                requested: 2,
            }
        );
        assert_eq!(cart.quantity_of("soda"), 1);
    }

    #[test]
    fn test_return_mode_rejects_add() {
        let cart = Cart::default().set_mode(PricingMode::Return);
        let err = add(&cart, &product("soda", 199, 5)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCartOperation { .. }));
    }

    #[test]
    fn test_weighed_product_waits_for_weight() {
        let turkey = weighed("turkey", 899);
        let cart = add(&Cart::default(), &turkey).unwrap();
        assert!(matches!(cart.pending(), Pending::AwaitingWeight(_)));
        assert!(cart.is_empty());

        // no second selection while one is pending
        assert!(add(&cart, &product("soda", 199, 5)).is_err());

        assert!(cart.confirm_weight(Weight::from_milli(0)).is_err());

        let cart = cart.confirm_weight(Weight::from_milli(750)).unwrap();
        assert_eq!(cart.pending(), &Pending::None);
        assert_eq!(cart.items()[0].quantity, 1);
        assert_eq!(cart.items()[0].weight_milli, Some(750));
        assert_eq!(cart.totals().subtotal_cents, 674);
    }

    #[test]
    fn test_age_gate_rejects_minor_and_admits_adult() {
        let wine = Product {
            is_age_restricted: true,
            ..product("wine", 1299, 3)
        };
        let cart = add(&Cart::default(), &wine).unwrap();
        assert!(matches!(cart.pending(), Pending::AwaitingAgeVerification(_)));

        let today = date(2024, 6, 14);
        let err = cart.confirm_age(date(2006, 6, 15), today).unwrap_err();
        assert_eq!(err, CoreError::AgeVerification { age: 17, minimum: 18 });

        let cart = cart.confirm_age(date(2006, 6, 14), today).unwrap();
        assert_eq!(cart.pending(), &Pending::None);
        assert_eq!(cart.quantity_of("wine"), 1);
    }

    #[test]
    fn test_age_verified_weighed_product_moves_to_weight_step() {
        let smoked = Product {
            is_age_restricted: true,
            ..weighed("smoked", 1599)
        };
        let cart = add(&Cart::default(), &smoked).unwrap();
        let cart = cart.confirm_age(date(1990, 1, 1), date(2024, 1, 1)).unwrap();
        assert!(matches!(cart.pending(), Pending::AwaitingWeight(_)));
    }

    #[test]
    fn test_configured_minimum_age_survives_clear() {
        let beer = Product {
            is_age_restricted: true,
            ..product("beer", 999, 6)
        };
        let cart = Cart::default().with_minimum_age(21);
        let pending = add(&cart, &beer).unwrap();

        let err = pending.confirm_age(date(2005, 1, 1), date(2024, 6, 1)).unwrap_err();
        assert_eq!(err, CoreError::AgeVerification { age: 19, minimum: 21 });

        let cleared = pending.clear();
        assert_eq!(cleared.minimum_age(), 21);
        assert_eq!(cleared.pending(), &Pending::None);
    }

    #[test]
    fn test_age_restricted_deli_token_waits_for_verification() {
        let base = Product {
            is_age_restricted: true,
            ..weighed("sake-ham", 1299)
        };
        let order = deli_order("deli-7", "sake-ham", 1500);

        let cart = Cart::default()
            .add_item(CartLineSource::DeliToken { order, product: base })
            .unwrap();
        assert!(cart.is_empty());
        assert!(matches!(
            cart.pending(),
            Pending::AwaitingAgeVerification(CartLineSource::DeliToken { .. })
        ));

        let today = date(2024, 6, 14);
        assert!(cart.confirm_age(date(2010, 1, 1), today).is_err());

        let cart = cart.confirm_age(date(1990, 1, 1), today).unwrap();
        assert_eq!(cart.pending(), &Pending::None);
        assert_eq!(cart.items()[0].deli_order_id.as_deref(), Some("deli-7"));
        assert_eq!(cart.totals().subtotal_cents, 1500);
    }

    #[test]
    fn test_check_accepts_scan() {
        assert!(Cart::default().check_accepts_scan().is_ok());
        assert!(Cart::default()
            .set_mode(PricingMode::Return)
            .check_accepts_scan()
            .is_err());
        let waiting = add(&Cart::default(), &weighed("turkey", 899)).unwrap();
        assert!(waiting.check_accepts_scan().is_err());
    }

    #[test]
    fn test_update_quantity_clamps_and_removes() {
        let soda = product("soda", 199, 4);
        let cart = add(&Cart::default(), &soda).unwrap();

        let (cart, outcome) = cart.update_quantity("soda", 9).unwrap();
        assert_eq!(outcome, QuantityUpdate::Clamped { requested: 9, ceiling: 4 });
        assert_eq!(cart.quantity_of("soda"), 4);

        let (cart, outcome) = cart.update_quantity("soda", 2).unwrap();
        assert_eq!(outcome, QuantityUpdate::Set { quantity: 2 });
        assert_eq!(cart.quantity_of("soda"), 2);

        let (cart, outcome) = cart.update_quantity("soda", 0).unwrap();
        assert_eq!(outcome, QuantityUpdate::Removed);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_rejects_weighed_lines() {
        let cart = add(&Cart::default(), &weighed("turkey", 899))
            .unwrap()
            .confirm_weight(Weight::from_milli(500))
            .unwrap();
        let err = cart.update_quantity("turkey", 3).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCartOperation { .. }));
    }

    #[test]
    fn test_deli_token_skips_weight_and_ceiling() {
        let base = weighed("ham", 799);
        let order = deli_order("deli-1", "ham", 999);

        let cart = Cart::default()
            .add_item(CartLineSource::DeliToken { order, product: base })
            .unwrap();

        assert_eq!(cart.pending(), &Pending::None);
        let line = &cart.items()[0];
        assert_eq!(line.quantity, 1);
        assert_eq!(line.weight_milli, None);
        assert_eq!(line.deli_order_id.as_deref(), Some("deli-1"));
        assert_eq!(cart.totals().subtotal_cents, 999);
    }

    #[test]
    fn test_promotions_reprice_every_transition() {
        let soda = product("soda", 1000, 5);
        let promo = Promotion {
            id: "tenoff".to_string(),
            description: "10% off".to_string(),
            discount_bps: 1000,
            start_date: Utc::now(),
            end_date: None,
            is_active: true,
            product_ids: vec!["soda".to_string()],
            created_at: Utc::now(),
        };
        let cart = Cart::new(TaxRate::from_bps(800), vec![promo]);
        let cart = add(&add(&cart, &soda).unwrap(), &soda).unwrap();

        assert_eq!(cart.items()[0].discount_cents, 200);
        assert_eq!(cart.totals().total_cents, 1944);
    }

    #[test]
    fn test_return_cart_builds_refund_request() {
        let snapshot = TransactionItem {
            id: "item-1".to_string(),
            transaction_id: "tx-1".to_string(),
            position: 0,
            product_id: "soda".to_string(),
            sku: "SODA".to_string(),
            name: "Soda".to_string(),
            price_cents: 199,
            cost_cents: None,
            quantity: 3,
            weight_milli: None,
            discount_cents: 0,
            line_total_cents: 597,
            deli_order_id: None,
        };

        let cart = Cart::default()
            .load_return_items(vec![CartItem::from_return_snapshot(&snapshot)], "tx-1");

        assert_eq!(cart.mode(), PricingMode::Return);
        assert_eq!(cart.totals().total_cents, -597);
        assert_eq!(cart.totals().tax_cents, 0);

        match cart.to_commit_request(TenderType::Cash, None, None).unwrap() {
            CommitRequest::Refund(request) => {
                assert_eq!(request.original_transaction_id, "tx-1");
                assert_eq!(request.lines[0].quantity, -3);
            }
            other => panic!("expected refund request, got {other:?}"),
        }

        let cleared = cart.clear();
        assert_eq!(cleared.mode(), PricingMode::Sale);
        assert!(cleared.returning_transaction_id().is_none());
    }

    #[test]
    fn test_sale_request_wire_shape() {
        let cart = add(&Cart::default(), &product("soda", 199, 5)).unwrap();
        let CommitRequest::Sale(request) = cart
            .to_commit_request(TenderType::Cash, Some(500), Some("cust-1".to_string()))
            .unwrap()
        else {
            panic!("expected sale request");
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tenderType"], "cash");
        assert_eq!(json["amountTenderedCents"], 500);
        assert_eq!(json["lines"][0]["productId"], "soda");
        assert_eq!(json["quoted"]["totalCents"], 215);
    }
}
