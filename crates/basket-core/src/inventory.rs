//! # Lot Planning
//!
//! The pure half of the lot inventory manager: deciding *which* lots a sale
//! draws from and *how many* eaches a case break yields. basket-db applies
//! these plans inside a database transaction.
//!
//! ## FEFO (First-Expire-First-Out)
//! ```text
//! lots for MILK, remaining > 0, sorted:
//!
//!   exp 2024-01-01  remaining 3   ◄── drawn first
//!   exp 2024-02-01  remaining 5
//!   exp (none)      remaining 8   ◄── undated lots go last
//!
//! sale of 4  ──►  [lot A: 3, lot B: 1]
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{InventoryLot, Product};
use crate::validation::validate_stock_quantity;

/// Quantity to take from one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDraw {
    pub lot_id: String,
    pub quantity: i64,
}

/// FEFO order: earliest expiration first, undated last, then oldest receipt.
pub fn fefo_cmp(a: &InventoryLot, b: &InventoryLot) -> Ordering {
    let by_expiry = match (a.expiration_date, b.expiration_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry
        .then(a.received_at.cmp(&b.received_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Plans a FEFO draw of `quantity` units across `lots`.
///
/// Lots with nothing remaining are skipped. Fails with `InsufficientStock`
/// when the lots together hold less than `quantity`.
pub fn plan_fefo(sku: &str, lots: &[InventoryLot], quantity: i64) -> CoreResult<Vec<LotDraw>> {
    validate_stock_quantity("quantity", quantity)?;

    let mut ordered: Vec<&InventoryLot> = lots.iter().filter(|l| l.quantity_remaining > 0).collect();
    ordered.sort_by(|a, b| fefo_cmp(a, b));

    let mut needed = quantity;
    let mut draws = Vec::new();
    for lot in ordered {
        if needed == 0 {
            break;
        }
        let take = needed.min(lot.quantity_remaining);
        draws.push(LotDraw {
            lot_id: lot.id.clone(),
            quantity: take,
        });
        needed -= take;
    }

    if needed > 0 {
        return Err(CoreError::InsufficientStock {
            sku: sku.to_string(),
            available: quantity - needed,
            requested: quantity,
        });
    }
    Ok(draws)
}

// =============================================================================
// Case Break
// =============================================================================

/// The stock movements of breaking `cases` cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseBreakPlan {
    pub case_product_id: String,
    pub each_product_id: String,
    pub cases: i64,
    pub eaches: i64,
}

/// Validates a case break and computes `eaches = cases × units per case`.
pub fn plan_case_break(case: &Product, cases: i64) -> CoreResult<CaseBreakPlan> {
    validate_stock_quantity("number of cases", cases)?;

    let link = case
        .case_link()
        .ok_or_else(|| CoreError::NotACase(case.sku.clone()))?;

    if case.stock_quantity < cases {
        return Err(CoreError::InsufficientStock {
            sku: case.sku.clone(),
            available: case.stock_quantity,
            requested: cases,
        });
    }

    let eaches = cases.checked_mul(link.units_per_case).ok_or_else(|| {
        CoreError::Validation(ValidationError::OutOfRange {
            field: "number of cases".to_string(),
            min: 1,
            max: i64::MAX / link.units_per_case,
        })
    })?;

    Ok(CaseBreakPlan {
        case_product_id: case.id.clone(),
        each_product_id: link.each_product_id,
        cases,
        eaches,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn lot(id: &str, remaining: i64, expires: Option<(i32, u32, u32)>) -> InventoryLot {
        InventoryLot {
            id: id.to_string(),
            product_id: "milk".to_string(),
            quantity_received: remaining.max(1),
            quantity_remaining: remaining,
            expiration_date: expires.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            received_at: Utc.with_ymd_and_hms(2023, 12, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_fefo_draws_earliest_expiration_first() {
        let lots = vec![
            lot("feb", 5, Some((2024, 2, 1))),
            lot("jan", 3, Some((2024, 1, 1))),
        ];

        let draws = plan_fefo("MILK", &lots, 4).unwrap();

        assert_eq!(
            draws,
            vec![
                LotDraw { lot_id: "jan".to_string(), quantity: 3 },
                LotDraw { lot_id: "feb".to_string(), quantity: 1 },
            ]
        );
    }

    #[test]
    fn test_fefo_puts_undated_lots_last_and_skips_empty() {
        let lots = vec![
            lot("undated", 10, None),
            lot("empty", 0, Some((2023, 1, 1))),
            lot("dated", 2, Some((2030, 1, 1))),
        ];

        let draws = plan_fefo("MILK", &lots, 3).unwrap();

        assert_eq!(draws[0].lot_id, "dated");
        assert_eq!(draws[1].lot_id, "undated");
        assert_eq!(draws[1].quantity, 1);
    }

    #[test]
    fn test_fefo_ties_break_on_receipt_time() {
        let mut older = lot("older", 2, Some((2024, 1, 1)));
        let mut newer = lot("newer", 2, Some((2024, 1, 1)));
        older.received_at = Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap();
        newer.received_at = older.received_at + Duration::days(3);

        let draws = plan_fefo("MILK", &[newer, older], 1).unwrap();
        assert_eq!(draws[0].lot_id, "older");
    }

    #[test]
    fn test_fefo_shortfall_is_insufficient_stock() {
        let lots = vec![lot("only", 3, Some((2024, 1, 1)))];

        let err = plan_fefo("MILK", &lots, 5).unwrap_err();

        assert_eq!(
            err,
            CoreError::InsufficientStock {
                sku: "MILK".to_string(),
                available: 3,
                requested: 5,
            }
        );
    }

    fn case_product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "soda-case".to_string(),
            sku: "SODA-CASE".to_string(),
            barcode: None,
            name: "Soda 24ct case".to_string(),
            price_cents: 1899,
            cost_cents: None,
            stock_quantity: stock,
            is_weighed: false,
            unit: "case".to_string(),
            is_age_restricted: false,
            contains_product_id: Some("soda".to_string()),
            case_unit_count: Some(24),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_case_break_multiplies_units() {
        let plan = plan_case_break(&case_product(5), 2).unwrap();
        assert_eq!(plan.each_product_id, "soda");
        assert_eq!(plan.cases, 2);
        assert_eq!(plan.eaches, 48);
    }

    #[test]
    fn test_case_break_rejects_plain_products_and_short_stock() {
        let mut plain = case_product(5);
        plain.case_unit_count = None;
        assert_eq!(
            plan_case_break(&plain, 1).unwrap_err(),
            CoreError::NotACase("SODA-CASE".to_string())
        );

        assert!(matches!(
            plan_case_break(&case_product(1), 2).unwrap_err(),
            CoreError::InsufficientStock { available: 1, requested: 2, .. }
        ));

        assert!(matches!(
            plan_case_break(&case_product(1), 0).unwrap_err(),
            CoreError::Validation(_)
        ));
    }
}
