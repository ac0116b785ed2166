//! # Pricing & Discount Engine
//!
//! One pure function, [`price`], turns an ordered list of cart lines into
//! per-line discounts and cart totals. The register runs it after every cart
//! transition, and the ledger runs the very same function again at commit
//! time; any disagreement between the two is a data-integrity fault
//! ([`verify_quote`]).
//!
//! ## Arithmetic
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line subtotal   = price × quantity            (unit lines)             │
//! │                  = round(price × weight) × sign (weighed lines)         │
//! │                                                                         │
//! │  line discount   = round(line subtotal × promo bps / 10000)  SALE ONLY  │
//! │                    first promotion (iteration order) naming the product │
//! │                                                                         │
//! │  subtotal        = Σ line subtotal                                      │
//! │  discounts       = Σ line discount                                      │
//! │  tax             = round((subtotal − discounts) × tax bps / 10000)      │
//! │                    0 in RETURN mode                                     │
//! │  total           = subtotal − discounts + tax                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first-match rule is a store policy, not an optimisation: a product in
//! two promotions gets the one listed first, even if the other is larger.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::CartItem;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{PricingMode, Promotion, TaxRate};

// =============================================================================
// Output Types
// =============================================================================

/// Aggregate totals of a priced cart, in cents.
///
/// `total_cents` is signed: a refund prices to a negative total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl CartTotals {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn is_refund(&self) -> bool {
        self.total_cents < 0
    }
}

/// Pricing result for one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedLine {
    pub product_id: String,
    pub line_subtotal_cents: i64,
    pub discount_cents: i64,
    /// The promotion that produced `discount_cents`, if any.
    pub promotion_id: Option<String>,
    pub line_total_cents: i64,
}

/// A fully priced cart: lines in input order plus aggregate totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub totals: CartTotals,
}

// =============================================================================
// Pricing
// =============================================================================

/// Subtotal of a single line before discounts.
///
/// Weighed lines carry `quantity = ±1` and the magnitude in `weight_milli`.
pub fn line_subtotal(item: &CartItem) -> Money {
    let price = Money::from_cents(item.unit_price_cents);
    match item.weight() {
        Some(weight) => price.multiply_weight(weight) * item.quantity.signum(),
        None => price.multiply_quantity(item.quantity),
    }
}

/// Prices `items` against the currently active `promotions`.
///
/// ## Example
/// ```rust
/// use basket_core::pricing::price;
/// use basket_core::types::{PricingMode, TaxRate};
///
/// let priced = price(&[], &[], PricingMode::Sale, TaxRate::default());
/// assert_eq!(priced.totals.total_cents, 0);
/// ```
pub fn price(
    items: &[CartItem],
    promotions: &[Promotion],
    mode: PricingMode,
    tax_rate: TaxRate,
) -> PricedCart {
    let mut lines = Vec::with_capacity(items.len());
    let mut subtotal = Money::zero();
    let mut discounts = Money::zero();

    for item in items {
        let line_subtotal = line_subtotal(item);

        let promotion = match mode {
            PricingMode::Sale => promotions.iter().find(|p| p.applies_to(&item.product_id)),
            PricingMode::Return => None,
        };
        let discount = promotion
            .map(|p| line_subtotal.percentage(p.discount_bps))
            .unwrap_or_default();

        subtotal += line_subtotal;
        discounts += discount;

        lines.push(PricedLine {
            product_id: item.product_id.clone(),
            line_subtotal_cents: line_subtotal.cents(),
            discount_cents: discount.cents(),
            promotion_id: promotion.map(|p| p.id.clone()),
            line_total_cents: (line_subtotal - discount).cents(),
        });
    }

    let tax = match mode {
        PricingMode::Sale => (subtotal - discounts).calculate_tax(tax_rate),
        PricingMode::Return => Money::zero(),
    };
    let total = subtotal - discounts + tax;

    PricedCart {
        lines,
        totals: CartTotals {
            subtotal_cents: subtotal.cents(),
            discount_cents: discounts.cents(),
            tax_cents: tax.cents(),
            total_cents: total.cents(),
        },
    }
}

/// Compares client-quoted totals with the ledger's own re-pricing.
///
/// Reports the first field that disagrees.
pub fn verify_quote(quoted: &CartTotals, computed: &CartTotals) -> CoreResult<()> {
    let fields = [
        ("subtotal", quoted.subtotal_cents, computed.subtotal_cents),
        ("discounts", quoted.discount_cents, computed.discount_cents),
        ("tax", quoted.tax_cents, computed.tax_cents),
        ("total", quoted.total_cents, computed.total_cents),
    ];

    for (field, quoted, computed) in fields {
        if quoted != computed {
            return Err(CoreError::PricingMismatch {
                field: field.to_string(),
                quoted,
                computed,
            });
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn line(product_id: &str, price_cents: i64, quantity: i64) -> CartItem {
        CartItem {
            product_id: product_id.to_string(),
            sku: product_id.to_uppercase(),
            name: product_id.to_string(),
            unit_price_cents: price_cents,
            cost_cents: None,
            is_age_restricted: false,
            stock_quantity: 100,
            quantity,
            weight_milli: None,
            deli_order_id: None,
            discount_cents: 0,
        }
    }

    fn promo(id: &str, bps: u32, products: &[&str]) -> Promotion {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Promotion {
            id: id.to_string(),
            description: format!("{id} promo"),
            discount_bps: bps,
            start_date: start,
            end_date: None,
            is_active: true,
            product_ids: products.iter().map(|p| p.to_string()).collect(),
            created_at: start,
        }
    }

    #[test]
    fn test_ten_dollar_item_with_ten_percent_promotion() {
        let items = vec![line("p1", 1000, 2)];
        let promos = vec![promo("tenoff", 1000, &["p1"])];

        let priced = price(&items, &promos, PricingMode::Sale, TaxRate::from_bps(800));

        assert_eq!(priced.totals.subtotal_cents, 2000);
        assert_eq!(priced.totals.discount_cents, 200);
        assert_eq!(priced.totals.tax_cents, 144);
        assert_eq!(priced.totals.total_cents, 1944);
        assert_eq!(priced.lines[0].promotion_id.as_deref(), Some("tenoff"));
        assert_eq!(priced.lines[0].line_total_cents, 1800);
    }

    #[test]
    fn test_first_matching_promotion_wins_over_larger_one() {
        let items = vec![line("p1", 1000, 1)];
        let promos = vec![promo("small", 500, &["p1"]), promo("big", 5000, &["p1"])];

        let priced = price(&items, &promos, PricingMode::Sale, TaxRate::zero());

        assert_eq!(priced.lines[0].promotion_id.as_deref(), Some("small"));
        assert_eq!(priced.totals.discount_cents, 50);
    }

    #[test]
    fn test_return_mode_has_no_tax_and_no_discounts() {
        let items = vec![line("p1", 1000, -2)];
        let promos = vec![promo("tenoff", 1000, &["p1"])];

        let priced = price(&items, &promos, PricingMode::Return, TaxRate::from_bps(800));

        assert_eq!(priced.totals.subtotal_cents, -2000);
        assert_eq!(priced.totals.discount_cents, 0);
        assert_eq!(priced.totals.tax_cents, 0);
        assert_eq!(priced.totals.total_cents, -2000);
        assert!(priced.totals.is_refund());
    }

    #[test]
    fn test_weighed_line_uses_weight_and_sign() {
        let mut sale = line("turkey", 899, 1);
        sale.weight_milli = Some(750);
        let mut refund = sale.clone();
        refund.quantity = -1;

        assert_eq!(line_subtotal(&sale).cents(), 674);
        assert_eq!(line_subtotal(&refund).cents(), -674);
    }

    #[test]
    fn test_total_identity_holds_across_mixed_cart() {
        let mut weighed = line("cheese", 1299, 1);
        weighed.weight_milli = Some(433);
        let items = vec![line("p1", 349, 3), weighed, line("p2", 99, 7)];
        let promos = vec![promo("cheese", 1500, &["cheese"]), promo("p2", 2500, &["p2"])];

        let totals = price(&items, &promos, PricingMode::Sale, TaxRate::from_bps(825)).totals;

        assert_eq!(
            totals.total_cents,
            totals.subtotal_cents - totals.discount_cents + totals.tax_cents
        );
    }

    #[test]
    fn test_verify_quote_reports_first_mismatch() {
        let computed = CartTotals {
            subtotal_cents: 2000,
            discount_cents: 200,
            tax_cents: 144,
            total_cents: 1944,
        };
        assert!(verify_quote(&computed, &computed).is_ok());

        let quoted = CartTotals {
            tax_cents: 160,
            total_cents: 1960,
            ..computed
        };
        let err = verify_quote(&quoted, &computed).unwrap_err();
        assert_eq!(
            err,
            CoreError::PricingMismatch {
                field: "tax".to_string(),
                quoted: 160,
                computed: 144,
            }
        );
    }
}
